//! Versioned symmetric key material with a rotation lifecycle.
//!
//! The ring is the one piece of shared mutable state in the enforcement
//! core. All access goes through a single readers-writer lock:
//! encrypt/decrypt hold the read side (an encrypt can never straddle two
//! ACTIVE versions, a decrypt can never observe a version mid-destruction),
//! while `rotate` and `destroy` hold the write side and therefore wait out
//! in-flight operations.
//!
//! State machine per version:
//!
//! ```text
//! ACTIVE ──rotate()──▶ RETIRED ──destroy()──▶ DESTROYED
//! ```
//!
//! RETIRED versions remain available for decryption; a RETIRED version is
//! never reactivated (rotation always mints a new version). DESTROYED
//! versions keep their ring entry forever — with zeroed material — so a
//! ciphertext tagged with one reports [`DecryptError::KeyDestroyed`]
//! rather than the weaker [`DecryptError::KeyUnknown`].

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// GCM nonce length, prepended to every sealed ciphertext.
const NONCE_LEN: usize = 12;

/// HKDF label for the full-block (seal/open) subkey.
const SEAL_LABEL: &[u8] = b"coffer.seal.v1";

/// HKDF label for the format-preserving (codec) subkey.
const FPE_LABEL: &[u8] = b"coffer.fpe.v1";

// ============================================================================
// Identifiers and state
// ============================================================================

/// Monotonically increasing identifier of one key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyVersionId(u32);

impl KeyVersionId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for KeyVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Lifecycle state of one key version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    /// The single version used for all new encryptions.
    Active,
    /// Retained for decryption only.
    Retired,
    /// Material erased; data tagged with this version is unrecoverable.
    Destroyed,
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyState::Active => write!(f, "active"),
            KeyState::Retired => write!(f, "retired"),
            KeyState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Non-secret metadata for one version, for operator inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyVersionInfo {
    pub id: KeyVersionId,
    pub state: KeyState,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Encrypted field
// ============================================================================

/// A persisted sensitive field: ciphertext plus the key version that
/// produced it.
///
/// The persistence layer stores this as two columns (or one composite
/// column); the version tag is never implicit. Produced either by
/// [`FieldCodec`](crate::FieldCodec) (format-preserving, ciphertext keeps
/// the plaintext's shape) or by [`KeyRing::seal`] (full-block, base64
/// ciphertext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    #[serde(rename = "keyVersionId")]
    pub key_version: KeyVersionId,
    pub ciphertext: String,
}

// ============================================================================
// Key material
// ============================================================================

/// 32 bytes of key material, zeroed from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct Material([u8; 32]);

impl Material {
    fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

struct KeyVersion {
    id: KeyVersionId,
    state: KeyState,
    created_at: DateTime<Utc>,
    material: Material,
}

impl KeyVersion {
    fn info(&self) -> KeyVersionInfo {
        KeyVersionInfo {
            id: self.id,
            state: self.state,
            created_at: self.created_at,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a key-ring lifecycle or encryption operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyRingError {
    /// The version id is not present in the ring at all.
    #[error("key version {0} is not in the ring")]
    UnknownVersion(KeyVersionId),

    /// Destroy was called on the ACTIVE version. Rotate first.
    #[error("key version {0} is active and cannot be destroyed; rotate first")]
    DestroyActive(KeyVersionId),

    /// Destroy was called twice on the same version.
    #[error("key version {0} is already destroyed")]
    AlreadyDestroyed(KeyVersionId),

    /// The underlying AEAD rejected the operation.
    #[error("cipher failure")]
    Cipher,
}

/// Failure to decrypt an [`EncryptedField`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    /// The stored version id is not present in the ring.
    #[error("key version {0} is not in the ring")]
    KeyUnknown(KeyVersionId),

    /// The stored version was destroyed. This is permanent data loss:
    /// surface to operators, do not retry.
    #[error("key version {0} has been destroyed; ciphertext is permanently unrecoverable")]
    KeyDestroyed(KeyVersionId),

    /// The ciphertext is structurally invalid or fails authentication.
    #[error("ciphertext is malformed or fails authentication")]
    Malformed,
}

/// Failure to migrate a field onto the ACTIVE version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReencryptError {
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
    #[error(transparent)]
    Ring(#[from] KeyRingError),
}

// ============================================================================
// Ring interior
// ============================================================================

/// Lock-protected interior. The ACTIVE version is held by value so its
/// presence is structural rather than a lookup invariant; RETIRED and
/// DESTROYED versions live in the map.
struct Ring {
    active: KeyVersion,
    inactive: BTreeMap<KeyVersionId, KeyVersion>,
}

impl Ring {
    /// Resolves a version for decryption.
    fn lookup(&self, id: KeyVersionId) -> Result<&KeyVersion, DecryptError> {
        if id == self.active.id {
            return Ok(&self.active);
        }
        match self.inactive.get(&id) {
            Some(version) if version.state == KeyState::Destroyed => {
                Err(DecryptError::KeyDestroyed(id))
            }
            Some(version) => Ok(version),
            None => Err(DecryptError::KeyUnknown(id)),
        }
    }
}

// ============================================================================
// KeyRing
// ============================================================================

/// Versioned symmetric key ring. See the module docs for the lifecycle.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct KeyRing {
    inner: RwLock<Ring>,
}

impl KeyRing {
    /// Creates a ring whose first ACTIVE version (v1) uses the given
    /// material.
    #[must_use]
    pub fn bootstrap(material: [u8; 32]) -> Self {
        let active = KeyVersion {
            id: KeyVersionId::new(1),
            state: KeyState::Active,
            created_at: Utc::now(),
            material: Material(material),
        };
        Self {
            inner: RwLock::new(Ring {
                active,
                inactive: BTreeMap::new(),
            }),
        }
    }

    /// Creates a ring with fresh random material for version 1.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::bootstrap(bytes)
    }

    pub(crate) fn from_parts(
        current: [u8; 32],
        retired: Vec<(KeyVersionId, [u8; 32])>,
    ) -> Self {
        let max_retired = retired.iter().map(|(id, _)| id.get()).max().unwrap_or(0);
        let now = Utc::now();
        let inactive = retired
            .into_iter()
            .map(|(id, material)| {
                let version = KeyVersion {
                    id,
                    state: KeyState::Retired,
                    created_at: now,
                    material: Material(material),
                };
                (id, version)
            })
            .collect();
        let active = KeyVersion {
            id: KeyVersionId::new(max_retired + 1),
            state: KeyState::Active,
            created_at: now,
            material: Material(current),
        };
        Self {
            inner: RwLock::new(Ring { active, inactive }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Ring> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ring> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the id of the current ACTIVE version.
    #[must_use]
    pub fn active_version(&self) -> KeyVersionId {
        self.read().active.id
    }

    /// Returns the state of a version, if it is in the ring.
    #[must_use]
    pub fn state_of(&self, id: KeyVersionId) -> Option<KeyState> {
        let ring = self.read();
        if id == ring.active.id {
            return Some(KeyState::Active);
        }
        ring.inactive.get(&id).map(|version| version.state)
    }

    /// Non-secret metadata for every version, newest first.
    #[must_use]
    pub fn versions(&self) -> Vec<KeyVersionInfo> {
        let ring = self.read();
        let mut all: Vec<KeyVersionInfo> = ring.inactive.values().map(KeyVersion::info).collect();
        all.push(ring.active.info());
        all.sort_by(|a, b| b.id.cmp(&a.id));
        all
    }

    /// Mints a new ACTIVE version with fresh random material and demotes
    /// the previous ACTIVE version to RETIRED.
    ///
    /// Ciphertexts produced before the rotation remain decryptable until
    /// their version is explicitly destroyed.
    pub fn rotate(&self) -> KeyVersionId {
        let mut ring = self.write();
        let next_id = KeyVersionId::new(ring.active.id.get() + 1);
        let fresh = KeyVersion {
            id: next_id,
            state: KeyState::Active,
            created_at: Utc::now(),
            material: Material::random(),
        };
        let mut previous = mem::replace(&mut ring.active, fresh);
        previous.state = KeyState::Retired;
        tracing::info!(active = %next_id, retired = %previous.id, "key ring rotated");
        ring.inactive.insert(previous.id, previous);
        next_id
    }

    /// Erases a RETIRED version's material. Irreversible.
    ///
    /// Data still tagged with the version becomes permanently
    /// unrecoverable; migrate it with [`Self::reencrypt`] first.
    ///
    /// # Errors
    ///
    /// [`KeyRingError::DestroyActive`] for the ACTIVE version,
    /// [`KeyRingError::AlreadyDestroyed`] for a repeat destruction,
    /// [`KeyRingError::UnknownVersion`] for an id not in the ring.
    pub fn destroy(&self, id: KeyVersionId) -> Result<(), KeyRingError> {
        let mut ring = self.write();
        if id == ring.active.id {
            return Err(KeyRingError::DestroyActive(id));
        }
        let version = ring
            .inactive
            .get_mut(&id)
            .ok_or(KeyRingError::UnknownVersion(id))?;
        if version.state == KeyState::Destroyed {
            return Err(KeyRingError::AlreadyDestroyed(id));
        }
        version.material.zeroize();
        version.state = KeyState::Destroyed;
        tracing::warn!(version = %id, "key version destroyed; tagged ciphertexts are now unrecoverable");
        Ok(())
    }

    /// Encrypts an arbitrary byte value under the ACTIVE version with
    /// AES-256-GCM.
    ///
    /// This is the fallback path for values that fit no supported
    /// [`FieldShape`](crate::FieldShape); the ciphertext is
    /// `base64(nonce || ct || tag)` and does not preserve format.
    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedField, KeyRingError> {
        let ring = self.read();
        let version = &ring.active;
        let key = subkey(&version.material.0, SEAL_LABEL, version.id);
        let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| KeyRingError::Cipher)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let payload = Payload {
            msg: plaintext,
            aad: &version.id.to_le_bytes(),
        };
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| KeyRingError::Cipher)?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);

        Ok(EncryptedField {
            key_version: version.id,
            ciphertext: BASE64.encode(framed),
        })
    }

    /// Decrypts a field sealed with [`Self::seal`], using the version
    /// recorded in the field.
    pub fn open(&self, field: &EncryptedField) -> Result<Vec<u8>, DecryptError> {
        let ring = self.read();
        let version = ring.lookup(field.key_version)?;
        let key = subkey(&version.material.0, SEAL_LABEL, version.id);
        let cipher =
            Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| DecryptError::Malformed)?;

        let framed = BASE64
            .decode(&field.ciphertext)
            .map_err(|_| DecryptError::Malformed)?;
        if framed.len() < NONCE_LEN {
            return Err(DecryptError::Malformed);
        }
        let (nonce, ciphertext) = framed.split_at(NONCE_LEN);

        let payload = Payload {
            msg: ciphertext,
            aad: &field.key_version.to_le_bytes(),
        };
        cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| DecryptError::Malformed)
    }

    /// Decrypts under the field's recorded version and re-encrypts under
    /// the current ACTIVE version.
    ///
    /// This is the migration path for moving stored data off a RETIRED
    /// version before destroying it.
    pub fn reencrypt(&self, field: &EncryptedField) -> Result<EncryptedField, ReencryptError> {
        let plaintext = Zeroizing::new(self.open(field)?);
        Ok(self.seal(&plaintext)?)
    }

    /// Runs `f` with the ACTIVE version's format-preserving subkey, under
    /// the read lock.
    pub(crate) fn with_active_fpe_key<T>(
        &self,
        f: impl FnOnce(KeyVersionId, &[u8; 32]) -> T,
    ) -> T {
        let ring = self.read();
        let version = &ring.active;
        let key = subkey(&version.material.0, FPE_LABEL, version.id);
        f(version.id, &key)
    }

    /// Runs `f` with the format-preserving subkey of a specific version,
    /// under the read lock.
    pub(crate) fn with_fpe_key<T>(
        &self,
        id: KeyVersionId,
        f: impl FnOnce(&[u8; 32]) -> T,
    ) -> Result<T, DecryptError> {
        let ring = self.read();
        let version = ring.lookup(id)?;
        let key = subkey(&version.material.0, FPE_LABEL, version.id);
        Ok(f(&key))
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.read();
        f.debug_struct("KeyRing")
            .field("active", &ring.active.id)
            .field("inactive", &ring.inactive.len())
            .finish()
    }
}

/// RFC 5869 HKDF-SHA256: one labeled subkey per version and purpose, so
/// the seal and codec paths never share a key.
fn subkey(material: &[u8; 32], label: &[u8], version: KeyVersionId) -> Zeroizing<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(label), material);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(&version.to_le_bytes(), okm.as_mut_slice())
        .expect("32-byte output within HKDF maximum");
    okm
}

// ============================================================================
// Tests
// ============================================================================
