//! Format-preserving encryption over numeral strings.
//!
//! A 10-round balanced Feistel network in the FF1 construction family: the
//! value is split into two numeral halves and each round replaces one half
//! with its sum (mod `radix^m`) against a pseudorandom function of the
//! other half. The PRF is HMAC-SHA-512 keyed with a per-version subkey;
//! the message binds a domain label, the radix, the total length, and the
//! round index, so a 9-digit ciphertext can never decrypt as a 10-digit
//! value and the digit and alphanumeric domains never collide.
//!
//! Supported lengths are 2..=32 numerals: halves of at most 16 numerals
//! keep all arithmetic within `u128` at radix 36.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::shape::{Alphabet, MAX_LEN, MIN_LEN};

type HmacSha512 = Hmac<Sha512>;

const ROUNDS: u8 = 10;
const DOMAIN: &[u8] = b"coffer.fpe.feistel.v1";

/// Encrypts `value` within its alphabet. Returns `None` when the value
/// contains characters outside the alphabet or has an unsupported length.
pub(crate) fn encrypt(key: &[u8; 32], alphabet: Alphabet, value: &str) -> Option<String> {
    let numerals = to_numerals(alphabet, value)?;
    let n = numerals.len();
    let u = n / 2;

    let mut a = numerals[..u].to_vec();
    let mut b = numerals[u..].to_vec();

    for round in 0..ROUNDS {
        let m = if round % 2 == 0 { u } else { n - u };
        let modulus = alphabet.radix().pow(m as u32);
        let y = round_value(key, alphabet, n, round, &b) % modulus;
        let c = (numeral_value(alphabet, &a) + y) % modulus;
        a = b;
        b = numerals_of(alphabet, c, m);
    }

    a.extend_from_slice(&b);
    Some(from_numerals(alphabet, &a))
}

/// Inverts [`encrypt`] under the same key and alphabet.
pub(crate) fn decrypt(key: &[u8; 32], alphabet: Alphabet, value: &str) -> Option<String> {
    let numerals = to_numerals(alphabet, value)?;
    let n = numerals.len();
    let u = n / 2;

    let mut a = numerals[..u].to_vec();
    let mut b = numerals[u..].to_vec();

    for round in (0..ROUNDS).rev() {
        let m = if round % 2 == 0 { u } else { n - u };
        let modulus = alphabet.radix().pow(m as u32);
        let prev_b = a;
        let y = round_value(key, alphabet, n, round, &prev_b) % modulus;
        let restored = (numeral_value(alphabet, &b) + modulus - y) % modulus;
        a = numerals_of(alphabet, restored, m);
        b = prev_b;
    }

    a.extend_from_slice(&b);
    Some(from_numerals(alphabet, &a))
}

/// One round of the PRF: HMAC-SHA-512 over the domain label, radix, total
/// length, round index, and the opposite half's numerals; folded to a
/// `u128`.
fn round_value(key: &[u8; 32], alphabet: Alphabet, total_len: usize, round: u8, half: &[u8]) -> u128 {
    let mut mac =
        HmacSha512::new_from_slice(key).expect("HMAC-SHA-512 accepts 32-byte keys");
    mac.update(DOMAIN);
    mac.update(&[alphabet.radix() as u8, total_len as u8, round]);
    mac.update(half);
    let tag = mac.finalize().into_bytes();

    let mut value = 0u128;
    for &byte in &tag[..16] {
        value = (value << 8) | u128::from(byte);
    }
    value
}

fn to_numerals(alphabet: Alphabet, value: &str) -> Option<Vec<u8>> {
    if !(MIN_LEN..=MAX_LEN).contains(&value.len()) {
        return None;
    }
    value
        .bytes()
        .map(|byte| alphabet.index_of(byte))
        .collect()
}

fn from_numerals(alphabet: Alphabet, numerals: &[u8]) -> String {
    numerals
        .iter()
        .map(|&numeral| char::from(alphabet.char_at(numeral)))
        .collect()
}

fn numeral_value(alphabet: Alphabet, numerals: &[u8]) -> u128 {
    numerals
        .iter()
        .fold(0u128, |acc, &numeral| {
            acc * alphabet.radix() + u128::from(numeral)
        })
}

fn numerals_of(alphabet: Alphabet, mut value: u128, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    for slot in out.iter_mut().rev() {
        *slot = (value % alphabet.radix()) as u8;
        value /= alphabet.radix();
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test_case("12" ; "shortest")]
    #[test_case("123456789" ; "nine digits")]
    #[test_case("4111111111111111" ; "sixteen digit pan")]
    #[test_case("00000000" ; "all zeros")]
    #[test_case("99999999999999999999999999999999" ; "longest")]
    fn digit_roundtrip(value: &str) {
        let ct = encrypt(&KEY, Alphabet::DIGITS, value).expect("encrypt");
        assert_eq!(ct.len(), value.len());
        assert!(ct.bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(decrypt(&KEY, Alphabet::DIGITS, &ct).expect("decrypt"), value);
    }

    #[test_case("ab" ; "two letters")]
    #[test_case("ref7k2x9" ; "mixed")]
    #[test_case("zzzzzzzzzz" ; "all max numeral")]
    fn alphanumeric_roundtrip(value: &str) {
        let ct = encrypt(&KEY, Alphabet::ALPHANUMERIC, value).expect("encrypt");
        assert_eq!(ct.len(), value.len());
        assert!(ct.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        assert_eq!(
            decrypt(&KEY, Alphabet::ALPHANUMERIC, &ct).expect("decrypt"),
            value
        );
    }

    #[test]
    fn rejects_out_of_alphabet_input() {
        assert_eq!(encrypt(&KEY, Alphabet::DIGITS, "12a4"), None);
        assert_eq!(encrypt(&KEY, Alphabet::ALPHANUMERIC, "AB12"), None);
    }

    #[test]
    fn rejects_unsupported_lengths() {
        assert_eq!(encrypt(&KEY, Alphabet::DIGITS, "1"), None);
        let long = "1".repeat(MAX_LEN + 1);
        assert_eq!(encrypt(&KEY, Alphabet::DIGITS, &long), None);
    }

    #[test]
    fn encryption_is_deterministic() {
        let a = encrypt(&KEY, Alphabet::DIGITS, "123456789").expect("encrypt");
        let b = encrypt(&KEY, Alphabet::DIGITS, "123456789").expect("encrypt");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_differ() {
        let other = [0x43; 32];
        let a = encrypt(&KEY, Alphabet::DIGITS, "123456789").expect("encrypt");
        let b = encrypt(&other, Alphabet::DIGITS, "123456789").expect("encrypt");
        assert_ne!(a, b);
    }

    #[test]
    fn length_is_bound_into_the_permutation() {
        // The same numeric prefix at different lengths must use unrelated
        // permutations.
        let short = encrypt(&KEY, Alphabet::DIGITS, "12345678").expect("encrypt");
        let long = encrypt(&KEY, Alphabet::DIGITS, "123456789").expect("encrypt");
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn odd_lengths_roundtrip() {
        for len in [3usize, 5, 7, 11, 13, 17, 31] {
            let value: String = (0..len).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
            let ct = encrypt(&KEY, Alphabet::DIGITS, &value).expect("encrypt");
            assert_eq!(ct.len(), len);
            assert_eq!(decrypt(&KEY, Alphabet::DIGITS, &ct).expect("decrypt"), value);
        }
    }

    proptest! {
        #[test]
        fn digits_always_roundtrip(value in "[0-9]{2,32}") {
            let ct = encrypt(&KEY, Alphabet::DIGITS, &value).expect("encrypt");
            prop_assert_eq!(ct.len(), value.len());
            prop_assert_eq!(decrypt(&KEY, Alphabet::DIGITS, &ct).expect("decrypt"), value);
        }

        #[test]
        fn alphanumerics_always_roundtrip(value in "[0-9a-z]{2,32}") {
            let ct = encrypt(&KEY, Alphabet::ALPHANUMERIC, &value).expect("encrypt");
            prop_assert_eq!(ct.len(), value.len());
            prop_assert_eq!(
                decrypt(&KEY, Alphabet::ALPHANUMERIC, &ct).expect("decrypt"),
                value
            );
        }
    }
}
