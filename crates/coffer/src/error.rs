//! Error type for the operations facade.

use thiserror::Error;

use coffer_crypto::{CodecError, KeyRingError};
use coffer_types::{AccountId, BusinessId, CardId};

/// Convenience alias used throughout the facade.
pub type Result<T> = std::result::Result<T, CofferError>;

/// Failure of an enforced operation.
///
/// `Access` is an expected outcome — the guard did its job — while the
/// crypto variants are faults. `KeyDestroyed` arriving through `Codec`
/// means a still-referenced ciphertext lost its key: surface it to
/// operators, never retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CofferError {
    /// The access guard denied the operation.
    #[error(transparent)]
    Access(#[from] coffer_rbac::AccessError),

    /// A sensitive field failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A key-ring lifecycle operation failed.
    #[error(transparent)]
    Ring(#[from] KeyRingError),

    #[error("no business {0}")]
    BusinessNotFound(BusinessId),

    #[error("no account {0}")]
    AccountNotFound(AccountId),

    #[error("no card {0}")]
    CardNotFound(CardId),
}
