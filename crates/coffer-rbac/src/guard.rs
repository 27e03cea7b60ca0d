//! Runtime access checks.
//!
//! [`AccessGuard::check`] is the single choke point every enforced
//! operation passes through before touching tenant-owned data. The check
//! is pure and stateless over immutable inputs; it is safe to call from
//! any number of request-handling threads without locking.
//!
//! Order of evaluation:
//!
//! 1. Platform-scoped requirements check roles directly — no tenant
//!    comparison.
//! 2. Tenant-scoped requirements compare the target's owning business to
//!    the principal's tenant. Any mismatch denies regardless of roles;
//!    the tenant boundary outranks every role grant.
//! 3. Only within a matching tenant are roles consulted.
//!
//! Cross-tenant denial therefore takes precedence over role denial in the
//! reported reason — the more security-relevant failure for audit.
//!
//! A `Deny` aborts the operation before any side effect begins; there is
//! nothing to roll back.

use thiserror::Error;
use tracing::{debug, warn};

use coffer_types::BusinessId;

use crate::principal::PrincipalContext;
use crate::requirement::{PermissionRequirement, ScopeRule};

/// Outcome of an access check. `Deny` is an expected result, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub const fn is_allow(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why an access check denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The target belongs to a different tenant than the principal.
    CrossTenantAccess,

    /// Tenant matched (or no tenant applies) but the principal lacks the
    /// required roles.
    InsufficientRole,

    /// A tenant-scoped operation was attempted by a principal carrying no
    /// tenant, or without naming a target owner.
    MissingTenantClaim,
}

/// The `?`-friendly form of a denial, carrying the operation identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("cross-tenant access denied for {operation}")]
    CrossTenantAccess { operation: &'static str },

    #[error("insufficient role for {operation}")]
    InsufficientRole { operation: &'static str },

    #[error("{operation} is tenant-scoped but no tenant applies to the request")]
    MissingTenantClaim { operation: &'static str },
}

impl AccessError {
    fn from_reason(reason: DenyReason, operation: &'static str) -> Self {
        match reason {
            DenyReason::CrossTenantAccess => AccessError::CrossTenantAccess { operation },
            DenyReason::InsufficientRole => AccessError::InsufficientRole { operation },
            DenyReason::MissingTenantClaim => AccessError::MissingTenantClaim { operation },
        }
    }
}

/// Runtime permission check, with audit events on every decision.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    audit_enabled: bool,
}

impl AccessGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            audit_enabled: true,
        }
    }

    /// Disables decision audit events (for tests).
    #[must_use]
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Checks whether `principal` may perform the operation declared by
    /// `requirement` on an entity owned by `target_owner`.
    ///
    /// `target_owner` is the owning business of the entity being accessed;
    /// pass `None` only for platform-scoped requirements, where it is
    /// ignored.
    // coffer-scan: allow(missing-enforcement) reason="this is the guard itself"
    #[must_use]
    pub fn check(
        &self,
        principal: &PrincipalContext,
        requirement: &PermissionRequirement,
        target_owner: Option<BusinessId>,
    ) -> Decision {
        let decision = Self::evaluate(principal, requirement, target_owner);
        if self.audit_enabled {
            self.audit(principal, requirement, target_owner, decision);
        }
        decision
    }

    /// [`Self::check`] as a `Result`, for use with `?` at the top of an
    /// enforced operation.
    pub fn require(
        &self,
        principal: &PrincipalContext,
        requirement: &PermissionRequirement,
        target_owner: Option<BusinessId>,
    ) -> Result<(), AccessError> {
        match self.check(principal, requirement, target_owner) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AccessError::from_reason(reason, requirement.name())),
        }
    }

    fn evaluate(
        principal: &PrincipalContext,
        requirement: &PermissionRequirement,
        target_owner: Option<BusinessId>,
    ) -> Decision {
        match requirement.scope() {
            ScopeRule::Platform => {
                if requirement.is_satisfied_by(principal.roles()) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::InsufficientRole)
                }
            }
            ScopeRule::Tenant => {
                let (Some(owner), Some(tenant)) = (target_owner, principal.business_id()) else {
                    return Decision::Deny(DenyReason::MissingTenantClaim);
                };
                if owner != tenant {
                    return Decision::Deny(DenyReason::CrossTenantAccess);
                }
                if requirement.is_satisfied_by(principal.roles()) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::InsufficientRole)
                }
            }
        }
    }

    fn audit(
        &self,
        principal: &PrincipalContext,
        requirement: &PermissionRequirement,
        target_owner: Option<BusinessId>,
        decision: Decision,
    ) {
        match decision {
            Decision::Allow => debug!(
                operation = requirement.name(),
                subject = %principal.subject_id(),
                tenant = ?principal.business_id(),
                target = ?target_owner,
                "access granted"
            ),
            Decision::Deny(reason) => warn!(
                operation = requirement.name(),
                subject = %principal.subject_id(),
                tenant = ?principal.business_id(),
                target = ?target_owner,
                reason = ?reason,
                "access denied"
            ),
        }
    }
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::new()
    }
}
