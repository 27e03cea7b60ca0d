//! Permission requirements.
//!
//! Every data-access operation declares one [`PermissionRequirement`] as a
//! `const` next to the operation definition. The same declaration is
//! consumed twice: by [`AccessGuard`](crate::AccessGuard) at runtime and
//! by the enforcement scanner at build time, so an operation cannot pass
//! the build with a requirement the guard never sees.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::roles::Role;

/// How the target entity's ownership constrains the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeRule {
    /// No tenant comparison; roles alone decide. Operator surfaces.
    Platform,

    /// The target's owning business must equal the principal's tenant.
    Tenant,
}

/// How the required role set is matched against the principal's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePolicy {
    /// Any one of the required roles suffices.
    AnyOf,

    /// Every required role must be held.
    AllOf,
}

/// A declared permission: the roles an operation demands and the scope
/// rule under which they apply.
///
/// Declared as consts so requirements exist at compile time:
///
/// ```
/// use coffer_rbac::{PermissionRequirement, Role};
///
/// const READ_ACCOUNT: PermissionRequirement = PermissionRequirement::tenant(
///     "account.read",
///     &[Role::Owner, Role::Admin, Role::Bookkeeper],
/// );
/// assert_eq!(READ_ACCOUNT.name(), "account.read");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionRequirement {
    name: &'static str,
    roles: &'static [Role],
    policy: RolePolicy,
    scope: ScopeRule,
}

impl PermissionRequirement {
    /// Tenant-scoped requirement satisfied by any of `roles`.
    #[must_use]
    pub const fn tenant(name: &'static str, roles: &'static [Role]) -> Self {
        assert!(!roles.is_empty(), "a requirement must demand at least one role");
        Self {
            name,
            roles,
            policy: RolePolicy::AnyOf,
            scope: ScopeRule::Tenant,
        }
    }

    /// Tenant-scoped requirement demanding every role in `roles`.
    #[must_use]
    pub const fn tenant_all_of(name: &'static str, roles: &'static [Role]) -> Self {
        assert!(!roles.is_empty(), "a requirement must demand at least one role");
        Self {
            name,
            roles,
            policy: RolePolicy::AllOf,
            scope: ScopeRule::Tenant,
        }
    }

    /// Platform-level requirement satisfied by any of `roles`.
    #[must_use]
    pub const fn platform(name: &'static str, roles: &'static [Role]) -> Self {
        assert!(!roles.is_empty(), "a requirement must demand at least one role");
        Self {
            name,
            roles,
            policy: RolePolicy::AnyOf,
            scope: ScopeRule::Platform,
        }
    }

    /// The operation identity, used in audit events and diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn roles(&self) -> &'static [Role] {
        self.roles
    }

    #[must_use]
    pub const fn policy(&self) -> RolePolicy {
        self.policy
    }

    #[must_use]
    pub const fn scope(&self) -> ScopeRule {
        self.scope
    }

    /// Returns whether `granted` satisfies the required role set under
    /// this requirement's policy.
    #[must_use]
    pub fn is_satisfied_by(&self, granted: &BTreeSet<Role>) -> bool {
        match self.policy {
            RolePolicy::AnyOf => self.roles.iter().any(|role| granted.contains(role)),
            RolePolicy::AllOf => self.roles.iter().all(|role| granted.contains(role)),
        }
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granted(roles: &[Role]) -> BTreeSet<Role> {
        roles.iter().copied().collect()
    }

    #[test]
    fn any_of_matches_one_role() {
        const REQ: PermissionRequirement =
            PermissionRequirement::tenant("card.issue", &[Role::Owner, Role::Admin]);

        assert!(REQ.is_satisfied_by(&granted(&[Role::Admin])));
        assert!(REQ.is_satisfied_by(&granted(&[Role::Owner, Role::Employee])));
        assert!(!REQ.is_satisfied_by(&granted(&[Role::Employee])));
        assert!(!REQ.is_satisfied_by(&granted(&[])));
    }

    #[test]
    fn all_of_requires_every_role() {
        const REQ: PermissionRequirement = PermissionRequirement::tenant_all_of(
            "account.close",
            &[Role::Owner, Role::Bookkeeper],
        );

        assert!(REQ.is_satisfied_by(&granted(&[Role::Owner, Role::Bookkeeper])));
        assert!(!REQ.is_satisfied_by(&granted(&[Role::Owner])));
        assert!(!REQ.is_satisfied_by(&granted(&[Role::Bookkeeper])));
    }

    #[test]
    fn platform_scope_is_recorded() {
        const REQ: PermissionRequirement = PermissionRequirement::platform(
            "business.list",
            &[Role::GlobalAdmin, Role::GlobalViewer],
        );
        assert_eq!(REQ.scope(), ScopeRule::Platform);
        assert_eq!(REQ.policy(), RolePolicy::AnyOf);
    }
}
