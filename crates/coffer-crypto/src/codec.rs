//! Format-preserving field codec.
//!
//! [`FieldCodec`] wraps the [`KeyRing`] with format preservation: the
//! ciphertext of a 9-digit value is another 9-digit value, tagged with the
//! key version that produced it. Encoding always uses the ACTIVE version;
//! decoding uses the version recorded in the field.
//!
//! The codec is stateless per call and safe to share freely across
//! request-handling threads; the only synchronization is the ring's
//! internal readers-writer lock.

use std::sync::Arc;

use thiserror::Error;

use crate::fpe;
use crate::keyring::{DecryptError, EncryptedField, KeyRing};
use crate::shape::FieldShape;

/// Failure of a field encode/decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The value does not match the declared shape, so it cannot be
    /// format-preserved. This is the one failure a caller must handle
    /// explicitly — typically by falling back to
    /// [`KeyRing::seal`] full-block encryption.
    #[error("value does not match the {shape} shape")]
    UnsupportedShape { shape: FieldShape },

    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

/// Format-preserving encrypt/decrypt of individual field values.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    ring: Arc<KeyRing>,
}

impl FieldCodec {
    #[must_use]
    pub fn new(ring: Arc<KeyRing>) -> Self {
        Self { ring }
    }

    /// Returns the ring this codec encodes against.
    #[must_use]
    pub fn ring(&self) -> &Arc<KeyRing> {
        &self.ring
    }

    /// Encrypts `value` under the ACTIVE key version, preserving its
    /// length and character class.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedShape`] when `value` does not match
    /// `shape`.
    pub fn encode(&self, value: &str, shape: FieldShape) -> Result<EncryptedField, CodecError> {
        if !shape.matches(value) {
            return Err(CodecError::UnsupportedShape { shape });
        }
        self.ring
            .with_active_fpe_key(|version, key| {
                fpe::encrypt(key, shape.alphabet(), value).map(|ciphertext| EncryptedField {
                    key_version: version,
                    ciphertext,
                })
            })
            .ok_or(CodecError::UnsupportedShape { shape })
    }

    /// Decrypts a field encoded with [`Self::encode`], using the key
    /// version recorded in the field.
    ///
    /// # Errors
    ///
    /// [`DecryptError::KeyUnknown`] / [`DecryptError::KeyDestroyed`] per
    /// the ring's version lookup; [`DecryptError::Malformed`] when the
    /// stored ciphertext does not itself match `shape`.
    pub fn decode(&self, field: &EncryptedField, shape: FieldShape) -> Result<String, CodecError> {
        if !shape.matches(&field.ciphertext) {
            return Err(CodecError::Decrypt(DecryptError::Malformed));
        }
        let decoded = self
            .ring
            .with_fpe_key(field.key_version, |key| {
                fpe::decrypt(key, shape.alphabet(), &field.ciphertext)
            })
            .map_err(CodecError::Decrypt)?;
        decoded.ok_or(CodecError::Decrypt(DecryptError::Malformed))
    }

    /// Decodes under the field's recorded version and re-encodes under the
    /// current ACTIVE version — the migration path for format-preserved
    /// fields before a version is destroyed.
    pub fn reencode(
        &self,
        field: &EncryptedField,
        shape: FieldShape,
    ) -> Result<EncryptedField, CodecError> {
        let plaintext = self.decode(field, shape)?;
        self.encode(&plaintext, shape)
    }
}

/// Masks all but the trailing four characters for log-safe display
/// (`"123456789"` → `"*****6789"`).
///
/// Apply only to plaintexts; ciphertexts need no masking.
#[must_use]
pub fn mask(value: &str) -> String {
    let chars = value.chars().count();
    let visible = if chars > 4 { 4 } else { 0 };
    let masked = chars - visible;
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        if i < masked {
            out.push('*');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;
    use crate::keyring::KeyVersionId;

    fn codec() -> FieldCodec {
        FieldCodec::new(Arc::new(KeyRing::generate()))
    }

    #[test_case("123456789", FieldShape::Digits ; "digits")]
    #[test_case("123456789", FieldShape::DigitsFixed(9) ; "fixed digits")]
    #[test_case("stmt7k2x", FieldShape::Alphanumeric ; "alphanumeric")]
    fn encode_decode_roundtrip(value: &str, shape: FieldShape) {
        let codec = codec();
        let field = codec.encode(value, shape).expect("encode");
        assert_eq!(field.ciphertext.len(), value.len());
        assert!(shape.matches(&field.ciphertext));
        assert_eq!(codec.decode(&field, shape).expect("decode"), value);
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        // A fixed point is possible in principle but vanishingly unlikely
        // at nine digits.
        let codec = codec();
        let field = codec.encode("123456789", FieldShape::Digits).expect("encode");
        assert_ne!(field.ciphertext, "123456789");
    }

    #[test_case("12a456789" ; "letter in digits")]
    #[test_case("1" ; "too short")]
    #[test_case("" ; "empty")]
    fn unsupported_values_are_rejected(value: &str) {
        let codec = codec();
        assert_eq!(
            codec.encode(value, FieldShape::Digits),
            Err(CodecError::UnsupportedShape {
                shape: FieldShape::Digits
            })
        );
    }

    #[test]
    fn unsupported_shape_falls_back_to_seal() {
        // The documented caller pattern: shape mismatch → full-block seal.
        let codec = codec();
        let value = "not a numeral string!";
        let Err(CodecError::UnsupportedShape { .. }) =
            codec.encode(value, FieldShape::Alphanumeric)
        else {
            panic!("free-form text must not be format-preservable");
        };
        let sealed = codec.ring().seal(value.as_bytes()).expect("seal");
        assert_eq!(codec.ring().open(&sealed).expect("open"), value.as_bytes());
    }

    #[test]
    fn decode_survives_rotation() {
        let codec = codec();
        let field = codec.encode("123456789", FieldShape::Digits).expect("encode");
        codec.ring().rotate();
        assert_eq!(
            codec.decode(&field, FieldShape::Digits).expect("decode"),
            "123456789"
        );
    }

    #[test]
    fn decode_after_destroy_reports_key_destroyed() {
        let codec = codec();
        let field = codec.encode("123456789", FieldShape::Digits).expect("encode");
        codec.ring().rotate();
        codec.ring().destroy(field.key_version).expect("destroy");

        assert_eq!(
            codec.decode(&field, FieldShape::Digits),
            Err(CodecError::Decrypt(DecryptError::KeyDestroyed(
                field.key_version
            )))
        );
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let codec = codec();
        let mut field = codec.encode("123456789", FieldShape::Digits).expect("encode");
        field.key_version = KeyVersionId::new(77);
        assert_eq!(
            codec.decode(&field, FieldShape::Digits),
            Err(CodecError::Decrypt(DecryptError::KeyUnknown(
                KeyVersionId::new(77)
            )))
        );
    }

    #[test]
    fn decode_rejects_shape_violating_ciphertext() {
        let codec = codec();
        let field = EncryptedField {
            key_version: codec.ring().active_version(),
            ciphertext: "12x456789".to_string(),
        };
        assert_eq!(
            codec.decode(&field, FieldShape::Digits),
            Err(CodecError::Decrypt(DecryptError::Malformed))
        );
    }

    #[test]
    fn reencode_migrates_to_active_version() {
        let codec = codec();
        let old = codec.encode("123456789", FieldShape::Digits).expect("encode");
        codec.ring().rotate();

        let migrated = codec.reencode(&old, FieldShape::Digits).expect("reencode");
        assert_eq!(migrated.key_version, codec.ring().active_version());
        assert_eq!(
            codec.decode(&migrated, FieldShape::Digits).expect("decode"),
            "123456789"
        );

        codec.ring().destroy(old.key_version).expect("destroy");
        assert_eq!(
            codec.decode(&migrated, FieldShape::Digits).expect("decode"),
            "123456789"
        );
    }

    #[test]
    fn encode_is_thread_safe() {
        let codec = codec();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let codec = codec.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let field = codec.encode("987654321", FieldShape::Digits).expect("encode");
                        assert_eq!(
                            codec.decode(&field, FieldShape::Digits).expect("decode"),
                            "987654321"
                        );
                    }
                })
            })
            .collect();
        codec.ring().rotate();
        for handle in handles {
            handle.join().expect("worker");
        }
    }

    #[test_case("123456789", "*****6789" ; "nine digits")]
    #[test_case("1234", "****" ; "four or fewer fully masked")]
    #[test_case("12", "**" ; "two")]
    #[test_case("", "" ; "empty")]
    fn masking(value: &str, expected: &str) {
        assert_eq!(mask(value), expected);
    }

    proptest! {
        #[test]
        fn format_preservation_holds(value in "[0-9]{2,32}") {
            let codec = codec();
            let field = codec.encode(&value, FieldShape::Digits).expect("encode");
            prop_assert_eq!(field.ciphertext.len(), value.len());
            prop_assert!(field.ciphertext.bytes().all(|b| b.is_ascii_digit()));
            prop_assert_eq!(codec.decode(&field, FieldShape::Digits).expect("decode"), value);
        }
    }
}
