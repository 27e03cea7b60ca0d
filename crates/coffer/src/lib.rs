//! # Coffer
//!
//! The cross-cutting enforcement core of a multi-tenant financial-services
//! platform. Coffer guarantees two things across every data-access path,
//! without relying on programmer discipline at each call site:
//!
//! - a caller can never read or write another tenant's financial data;
//! - sensitive fields are never persisted in plaintext.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Coffer                             │
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │ TypedId  │   │ Principal │ → │  Guard   │ → │  Codec   │  │
//! │  │ (kinds)  │   │ (claims)  │   │ (tenant  │   │ (FPE +   │  │
//! │  │          │   │           │   │  + role) │   │  KeyRing)│  │
//! │  └──────────┘   └───────────┘   └──────────┘   └──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//!          build time: coffer-scan verifies every entry point
//! ```
//!
//! A request arrives with verified token claims → [`PrincipalContext`]
//! is constructed fail-fast → every operation on the [`Coffer`] facade
//! calls the [`AccessGuard`] before touching the store → sensitive fields
//! pass through the [`FieldCodec`] under the current [`KeyRing`] version
//! on write and are decoded on read. The `coffer-scan` binary walks the
//! same entry points at build time and fails the build if any operation
//! lacks a declared [`PermissionRequirement`].
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use coffer::{Coffer, KeyRing, PrincipalContext, Role, UserId, UserType};
//!
//! # fn main() -> coffer::Result<()> {
//! let coffer = Coffer::new(Arc::new(KeyRing::generate()));
//!
//! // Platform operator registers a tenant.
//! let operator = PrincipalContext::new(
//!     UserType::Support,
//!     UserId::new(),
//!     None,
//!     [Role::GlobalAdmin].into_iter().collect(),
//! ).expect("platform principal");
//! let business = coffer.register_business(&operator)?;
//!
//! // A business owner opens an account; numbers are encrypted at rest.
//! let owner = PrincipalContext::new(
//!     UserType::BusinessOwner,
//!     UserId::new(),
//!     Some(business),
//!     [Role::Owner].into_iter().collect(),
//! ).expect("owner principal");
//! let account = coffer.open_account(&owner, business, "021000021", "123456789")?;
//!
//! let view = coffer.read_account(&owner, account)?;
//! assert_eq!(view.account_number, "123456789");
//! # Ok(())
//! # }
//! ```

mod error;
pub mod ops;
mod store;

pub use error::{CofferError, Result};
pub use ops::{AccountView, Coffer};

// Re-export typed identifiers
pub use coffer_types::{
    AccountId, AdjustmentId, AllocationId, BankAccountId, BusinessId, CardId, EntityKind, IdKind,
    ParseError, ReceiptId, TypedId, UserId,
};

// Re-export the encryption layer
pub use coffer_crypto::{
    CodecError, DecryptError, EncryptedField, FieldCodec, FieldShape, KeyConfigError, KeyRing,
    KeyRingConfig, KeyRingError, KeyState, KeyVersionId, mask,
};

// Re-export the runtime enforcement layer
pub use coffer_rbac::{
    AccessError, AccessGuard, ClaimError, Decision, DenyReason, PermissionRequirement,
    PrincipalContext, Role, RolePolicy, ScopeRule, TokenClaims, UserType,
};
