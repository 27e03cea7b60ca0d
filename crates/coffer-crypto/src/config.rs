//! Key-material configuration.
//!
//! Key material reaches the process through the environment, one variable
//! per version:
//!
//! ```text
//! COFFER_KEY_CURRENT    base64, 32 bytes   → the ACTIVE version
//! COFFER_KEY_RETIRED_1  base64, 32 bytes   → RETIRED version 1
//! COFFER_KEY_RETIRED_2  …                  → RETIRED version 2, and so on
//! ```
//!
//! Retired variables are numbered from 1 without gaps; the ACTIVE version
//! is assigned the next id after the highest retired one. Missing or
//! malformed material is a typed [`KeyConfigError`] — the ring never
//! starts with a defaulted or partial key set.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq as _;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::keyring::{KeyRing, KeyVersionId};

/// Environment variable holding the ACTIVE version's material.
pub const CURRENT_VAR: &str = "COFFER_KEY_CURRENT";

/// Prefix of the numbered RETIRED version variables.
pub const RETIRED_PREFIX: &str = "COFFER_KEY_RETIRED_";

/// Upper bound on configured versions, matching the ring's practical
/// lifetime; also stops a runaway scan if the environment is corrupt.
const MAX_KEYS: u32 = 1000;

/// Failure to assemble a key ring from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyConfigError {
    /// A required variable is unset or empty.
    #[error("{0} is not set")]
    Missing(String),

    /// A variable's value is not 32 base64-encoded bytes.
    #[error("{var}: {reason}")]
    Invalid { var: String, reason: String },

    /// Two variables carry the same key material.
    #[error("{var} duplicates previously configured key material")]
    Duplicate { var: String },
}

/// Validated key material for every configured version.
pub struct KeyRingConfig {
    current: Zeroizing<[u8; 32]>,
    retired: Vec<(KeyVersionId, Zeroizing<[u8; 32]>)>,
}

impl std::fmt::Debug for KeyRingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRingConfig")
            .field("current", &"<redacted>")
            .field("retired_count", &self.retired.len())
            .finish()
    }
}

impl KeyRingConfig {
    /// Loads and validates key material from the process environment.
    pub fn from_env() -> Result<Self, KeyConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads key material through an arbitrary variable lookup.
    ///
    /// `from_env` is this with `std::env::var`; tests supply a map.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, KeyConfigError> {
        let current_raw = lookup(CURRENT_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| KeyConfigError::Missing(CURRENT_VAR.to_string()))?;
        let current = decode_key(CURRENT_VAR, &current_raw)?;

        let mut retired = Vec::new();
        let mut seen = vec![key_digest(&current)];

        for n in 1..=MAX_KEYS {
            let var = format!("{RETIRED_PREFIX}{n}");
            let Some(raw) = lookup(&var) else {
                break;
            };
            let key = decode_key(&var, &raw)?;

            let digest = key_digest(&key);
            if seen.iter().any(|existing| bool::from(existing.ct_eq(&digest))) {
                return Err(KeyConfigError::Duplicate { var });
            }
            seen.push(digest);

            retired.push((KeyVersionId::new(n), key));
        }

        Ok(Self { current, retired })
    }

    /// Number of RETIRED versions configured.
    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Builds the ring: retired versions keep their numbered ids, the
    /// current material becomes ACTIVE under the next id.
    #[must_use]
    pub fn into_ring(self) -> KeyRing {
        let retired = self
            .retired
            .into_iter()
            .map(|(id, key)| (id, *key))
            .collect();
        KeyRing::from_parts(*self.current, retired)
    }
}

fn decode_key(var: &str, raw: &str) -> Result<Zeroizing<[u8; 32]>, KeyConfigError> {
    let bytes = Zeroizing::new(BASE64.decode(raw.trim()).map_err(|_| {
        KeyConfigError::Invalid {
            var: var.to_string(),
            reason: "not valid base64".to_string(),
        }
    })?);
    if bytes.len() != 32 {
        return Err(KeyConfigError::Invalid {
            var: var.to_string(),
            reason: format!("expected 32 bytes of key material, got {}", bytes.len()),
        });
    }
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Keys are compared by digest, in constant time, so configuration
/// validation never branches on raw material.
fn key_digest(key: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.finalize().into()
}
