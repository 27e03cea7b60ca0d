//! Field shapes: the syntactic classes the format-preserving codec
//! supports.
//!
//! A shape pins down the character class (and optionally the exact length)
//! of a field's plaintext. Ciphertexts produced by the codec satisfy the
//! same shape, so downstream validation — column constraints, checksum
//! placeholders, masked display — keeps working on encrypted values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shortest value the Feistel rounds can permute meaningfully.
pub(crate) const MIN_LEN: usize = 2;

/// Longest supported value; halves of up to 16 numerals fit `u128`
/// arithmetic at radix 36.
pub(crate) const MAX_LEN: usize = 32;

/// A supported plaintext class for format-preserving encryption.
///
/// Values outside every supported shape cannot be format-preserved and
/// must go through [`KeyRing::seal`](crate::KeyRing::seal) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldShape {
    /// ASCII digits `0-9`, any supported length. Account and routing
    /// numbers, PANs.
    Digits,

    /// ASCII digits and lowercase letters `a-z`. Reference codes,
    /// statement tokens.
    Alphanumeric,

    /// Exactly `n` ASCII digits (e.g. nine-digit account numbers).
    DigitsFixed(usize),
}

impl FieldShape {
    /// Returns whether `value` belongs to this shape.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        let len_ok = match self {
            FieldShape::Digits | FieldShape::Alphanumeric => {
                (MIN_LEN..=MAX_LEN).contains(&value.len())
            }
            FieldShape::DigitsFixed(n) => {
                value.len() == *n && (MIN_LEN..=MAX_LEN).contains(n)
            }
        };
        len_ok && value.bytes().all(|b| self.alphabet().contains(b))
    }

    pub(crate) fn alphabet(&self) -> Alphabet {
        match self {
            FieldShape::Digits | FieldShape::DigitsFixed(_) => Alphabet::DIGITS,
            FieldShape::Alphanumeric => Alphabet::ALPHANUMERIC,
        }
    }
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldShape::Digits => write!(f, "digits"),
            FieldShape::Alphanumeric => write!(f, "alphanumeric"),
            FieldShape::DigitsFixed(n) => write!(f, "{n}-digit"),
        }
    }
}

/// Ordered character set a shape draws from; the radix of the numeral
/// system the Feistel network permutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Alphabet {
    chars: &'static [u8],
}

impl Alphabet {
    pub(crate) const DIGITS: Alphabet = Alphabet {
        chars: b"0123456789",
    };

    pub(crate) const ALPHANUMERIC: Alphabet = Alphabet {
        chars: b"0123456789abcdefghijklmnopqrstuvwxyz",
    };

    pub(crate) fn radix(self) -> u128 {
        self.chars.len() as u128
    }

    pub(crate) fn contains(self, byte: u8) -> bool {
        self.chars.contains(&byte)
    }

    /// Maps a character to its numeral value. Callers validate membership
    /// via [`FieldShape::matches`] first.
    pub(crate) fn index_of(self, byte: u8) -> Option<u8> {
        self.chars
            .iter()
            .position(|&c| c == byte)
            .map(|i| i as u8)
    }

    pub(crate) fn char_at(self, index: u8) -> u8 {
        self.chars[usize::from(index) % self.chars.len()]
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(FieldShape::Digits, "123456789", true ; "digits ok")]
    #[test_case(FieldShape::Digits, "12a4", false ; "digits reject letter")]
    #[test_case(FieldShape::Digits, "1", false ; "digits too short")]
    #[test_case(FieldShape::Digits, "123456789012345678901234567890123", false ; "digits too long")]
    #[test_case(FieldShape::Alphanumeric, "ab12cd", true ; "alnum ok")]
    #[test_case(FieldShape::Alphanumeric, "AB12", false ; "alnum rejects uppercase")]
    #[test_case(FieldShape::Alphanumeric, "ab-12", false ; "alnum rejects punctuation")]
    #[test_case(FieldShape::DigitsFixed(9), "123456789", true ; "fixed ok")]
    #[test_case(FieldShape::DigitsFixed(9), "12345678", false ; "fixed wrong length")]
    fn shape_matching(shape: FieldShape, value: &str, expected: bool) {
        assert_eq!(shape.matches(value), expected);
    }

    #[test]
    fn alphabet_round_trips_indices() {
        for alphabet in [Alphabet::DIGITS, Alphabet::ALPHANUMERIC] {
            for (i, &c) in alphabet.chars.iter().enumerate() {
                assert_eq!(alphabet.index_of(c), Some(i as u8));
                assert_eq!(alphabet.char_at(i as u8), c);
            }
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(FieldShape::Digits.to_string(), "digits");
        assert_eq!(FieldShape::DigitsFixed(9).to_string(), "9-digit");
    }
}
