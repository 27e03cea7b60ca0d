//! Role definitions.
//!
//! Two families of roles, matching the two scopes the guard understands:
//!
//! - **Tenant-scoped** roles are granted within one business and mean
//!   nothing outside it: Owner, Admin, Manager, Employee, Bookkeeper.
//! - **Platform** roles belong to operator staff and carry no tenant:
//!   GlobalAdmin, CustomerService, GlobalViewer.
//!
//! Roles arrive as token claims in their SCREAMING_SNAKE wire form
//! (`"BUSINESS_OWNER"` tokens carry `"OWNER"`, support staff carry
//! `"CUSTOMER_SERVICE"`, …).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A granted role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// The business owner. Full control within the tenant, including
    /// money movement and user management.
    Owner,

    /// Tenant administrator: user and card management, no ownership
    /// transfer.
    Admin,

    /// Allocation manager: moves funds within allocations they manage.
    Manager,

    /// Cardholder employee: sees own cards and transactions only.
    Employee,

    /// Read-only accounting access within the tenant.
    Bookkeeper,

    /// Platform operator with full cross-tenant access.
    GlobalAdmin,

    /// Support staff: cross-tenant read and limited remediation.
    CustomerService,

    /// Platform read-only access, for monitoring and analytics.
    GlobalViewer,
}

impl Role {
    /// Every role, tenant-scoped first.
    pub const ALL: [Role; 8] = [
        Role::Owner,
        Role::Admin,
        Role::Manager,
        Role::Employee,
        Role::Bookkeeper,
        Role::GlobalAdmin,
        Role::CustomerService,
        Role::GlobalViewer,
    ];

    /// Returns whether this role is granted platform-wide rather than
    /// within one business.
    #[must_use]
    pub const fn is_platform(self) -> bool {
        matches!(
            self,
            Role::GlobalAdmin | Role::CustomerService | Role::GlobalViewer
        )
    }

    /// Returns whether this role only has meaning inside a tenant.
    #[must_use]
    pub const fn is_tenant_scoped(self) -> bool {
        !self.is_platform()
    }

    /// The claim wire form, as the token issuer writes it.
    #[must_use]
    pub const fn claim_name(self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
            Role::Bookkeeper => "BOOKKEEPER",
            Role::GlobalAdmin => "GLOBAL_ADMIN",
            Role::CustomerService => "CUSTOMER_SERVICE",
            Role::GlobalViewer => "GLOBAL_VIEWER",
        }
    }

    /// Parses the claim wire form.
    #[must_use]
    pub fn from_claim(claim: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.claim_name() == claim)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.claim_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_claim(role.claim_name()), Some(role));
        }
        assert_eq!(Role::from_claim("SUPERUSER"), None);
    }

    #[test]
    fn scope_partition() {
        let platform: Vec<Role> = Role::ALL.into_iter().filter(|r| r.is_platform()).collect();
        assert_eq!(
            platform,
            vec![Role::GlobalAdmin, Role::CustomerService, Role::GlobalViewer]
        );
        for role in Role::ALL {
            assert_ne!(role.is_platform(), role.is_tenant_scoped());
        }
    }

    #[test]
    fn serde_uses_claim_wire_form() {
        let json = serde_json::to_string(&Role::CustomerService).expect("serialize");
        assert_eq!(json, "\"CUSTOMER_SERVICE\"");
        let back: Role = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Role::CustomerService);
    }
}
