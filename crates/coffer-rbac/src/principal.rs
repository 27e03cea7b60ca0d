//! The authenticated caller.
//!
//! An external collaborator verifies the bearer token and hands its claims
//! to [`PrincipalContext::from_claims`]. Construction is fail-fast: a
//! business-scoped user type without a `businessId` claim is
//! [`ClaimError::MissingTenantClaim`], never a silently-null tenant.
//!
//! The context is built once per request, is immutable for the request's
//! lifetime, and is never persisted — there is deliberately no `Serialize`
//! implementation.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use coffer_types::{BusinessId, UserId};

use crate::roles::Role;

/// Claim key carrying the tenant id.
pub const BUSINESS_ID: &str = "businessId";

/// Claim key carrying the platform user id.
pub const CAPITAL_USER_ID: &str = "capitalUserId";

/// Claim key carrying the user type.
pub const USER_TYPE: &str = "userType";

/// Claim key carrying the granted role names.
pub const ROLES: &str = "roles";

/// What kind of actor the token was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    /// The owner of a business. Business-scoped.
    BusinessOwner,
    /// A user employed by a business. Business-scoped.
    Employee,
    /// Platform support staff; carries no tenant.
    Support,
}

impl UserType {
    /// Business-scoped actors must carry a `businessId` claim.
    #[must_use]
    pub const fn is_business_scoped(self) -> bool {
        matches!(self, UserType::BusinessOwner | UserType::Employee)
    }

    /// The claim wire form.
    #[must_use]
    pub const fn claim_name(self) -> &'static str {
        match self {
            UserType::BusinessOwner => "BUSINESS_OWNER",
            UserType::Employee => "EMPLOYEE",
            UserType::Support => "SUPPORT",
        }
    }

    #[must_use]
    pub fn from_claim(claim: &str) -> Option<Self> {
        [UserType::BusinessOwner, UserType::Employee, UserType::Support]
            .into_iter()
            .find(|user_type| user_type.claim_name() == claim)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.claim_name())
    }
}

/// The claim set the token issuer populates, as deserialized from the
/// verified token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "businessId", default)]
    pub business_id: Option<String>,

    #[serde(rename = "capitalUserId")]
    pub subject_id: String,

    #[serde(rename = "userType")]
    pub user_type: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

/// Failure to build a [`PrincipalContext`] from claims.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// A business-scoped user type arrived without a tenant claim.
    #[error("{user_type} token carries no {BUSINESS_ID} claim")]
    MissingTenantClaim { user_type: UserType },

    /// A claim is present but unusable.
    #[error("invalid {claim} claim: {reason}")]
    InvalidClaim { claim: &'static str, reason: String },
}

/// The authenticated caller: tenant, subject, user type, and granted
/// roles. Immutable for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    business_id: Option<BusinessId>,
    subject_id: UserId,
    user_type: UserType,
    roles: BTreeSet<Role>,
}

impl PrincipalContext {
    /// Builds a context, enforcing the tenant-presence invariant.
    ///
    /// # Errors
    ///
    /// [`ClaimError::MissingTenantClaim`] when `user_type` is
    /// business-scoped and `business_id` is `None`.
    pub fn new(
        user_type: UserType,
        subject_id: UserId,
        business_id: Option<BusinessId>,
        roles: BTreeSet<Role>,
    ) -> Result<Self, ClaimError> {
        if user_type.is_business_scoped() && business_id.is_none() {
            return Err(ClaimError::MissingTenantClaim { user_type });
        }
        Ok(Self {
            business_id,
            subject_id,
            user_type,
            roles,
        })
    }

    /// Builds a context from verified token claims.
    ///
    /// # Errors
    ///
    /// [`ClaimError::InvalidClaim`] for an unknown user type or role name
    /// or an unparseable id; [`ClaimError::MissingTenantClaim`] per
    /// [`Self::new`].
    pub fn from_claims(claims: &TokenClaims) -> Result<Self, ClaimError> {
        let user_type = UserType::from_claim(&claims.user_type).ok_or_else(|| {
            ClaimError::InvalidClaim {
                claim: USER_TYPE,
                reason: format!("unknown user type {:?}", claims.user_type),
            }
        })?;

        let subject_id =
            UserId::parse(&claims.subject_id).map_err(|err| ClaimError::InvalidClaim {
                claim: CAPITAL_USER_ID,
                reason: err.to_string(),
            })?;

        let business_id = claims
            .business_id
            .as_deref()
            .map(|raw| {
                BusinessId::parse(raw).map_err(|err| ClaimError::InvalidClaim {
                    claim: BUSINESS_ID,
                    reason: err.to_string(),
                })
            })
            .transpose()?;

        let roles = claims
            .roles
            .iter()
            .map(|raw| {
                Role::from_claim(raw).ok_or_else(|| ClaimError::InvalidClaim {
                    claim: ROLES,
                    reason: format!("unknown role {raw:?}"),
                })
            })
            .collect::<Result<BTreeSet<Role>, ClaimError>>()?;

        Self::new(user_type, subject_id, business_id, roles)
    }

    /// The tenant this principal acts within, if any.
    #[must_use]
    pub fn business_id(&self) -> Option<BusinessId> {
        self.business_id
    }

    /// The authenticated user.
    #[must_use]
    pub fn subject_id(&self) -> UserId {
        self.subject_id
    }

    #[must_use]
    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
