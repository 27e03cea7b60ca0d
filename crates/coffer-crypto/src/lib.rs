//! # coffer-crypto: Versioned field-level encryption
//!
//! Sensitive fields are never persisted in plaintext. This crate provides
//! the two encryption paths the platform uses and the key lifecycle behind
//! both:
//!
//! - [`KeyRing`] — versioned symmetric key material. Exactly one version is
//!   ACTIVE at a time; rotation mints a new version and demotes the old one
//!   to RETIRED (decrypt-only); destruction erases a RETIRED version's
//!   material forever.
//! - [`FieldCodec`] — format-preserving encryption of individual field
//!   values: a nine-digit account number encrypts to nine digits, so masked
//!   display, column constraints, and log scrubbing keep working without
//!   the plaintext.
//! - [`KeyRing::seal`] / [`KeyRing::open`] — full-block AES-256-GCM for
//!   values that fit no supported shape.
//!
//! Every ciphertext is tagged with the key version that produced it; the
//! tag is stored alongside the ciphertext ([`EncryptedField`]) and is never
//! implicit.
//!
//! ```text
//! plaintext ── FieldCodec::encode ──▶ EncryptedField { key_version, ciphertext }
//!                   │                                      │
//!             ACTIVE version                      stored as two columns
//!                   │                                      │
//! plaintext ◀─ FieldCodec::decode ◀─────────── version looked up by tag
//! ```
//!
//! ## Destroyed keys
//!
//! Destroying a key version is deliberate data destruction: any ciphertext
//! still tagged with it becomes permanently unrecoverable and decryption
//! reports [`DecryptError::KeyDestroyed`]. Callers migrate data off a
//! version with [`KeyRing::reencrypt`] *before* destroying it.

pub mod codec;
pub mod config;
mod fpe;
pub mod keyring;
pub mod shape;

pub use codec::{CodecError, FieldCodec, mask};
pub use config::{KeyConfigError, KeyRingConfig};
pub use keyring::{
    DecryptError, EncryptedField, KeyRing, KeyRingError, KeyState, KeyVersionId, ReencryptError,
};
pub use shape::FieldShape;
