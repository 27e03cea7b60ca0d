//! # coffer-types: Typed entity identifiers for Coffer
//!
//! Every entity in the platform is addressed by a [`TypedId`]: a 128-bit
//! random value paired with a compile-time entity-kind tag. The tag makes
//! identifier confusion a type error — an account id cannot be passed where
//! a card id is expected, and a serialized id carries its kind as a wire
//! prefix (`acct_…`, `card_…`) so the mismatch is also caught at every
//! deserialization boundary.
//!
//! This crate contains:
//! - [`TypedId`] — the identifier value itself
//! - [`EntityKind`] — the fixed registry of entity kinds and their prefixes
//! - [`ParseError`] — kind-checked parsing failures
//!
//! ## Wire form
//!
//! ```text
//! biz_8f14e45f-ceea-467f-9d9e-8b7a2f6f3a01
//! ^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//! kind prefix          UUID (v4)
//! ```
//!
//! Parsing rejects any string whose prefix does not match the expected
//! kind ([`ParseError::KindMismatch`]) and any remainder that is not a
//! UUID ([`ParseError::Malformed`]).
//!
//! ## Lifecycle
//!
//! Ids are minted once, at entity-creation time, by [`TypedId::new`] and
//! are immutable thereafter. There is no constructor that accepts a
//! caller-chosen value; `parse` only reproduces ids that were already
//! issued, so tombstoned ids are never recycled.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Entity-kind registry
// ============================================================================

/// The fixed, versioned registry of entity kinds.
///
/// Shared between serialization and validation. Adding a kind is additive
/// and backward compatible; removing one is a breaking change that requires
/// a data migration, so kinds are never removed or renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A tenant. The isolation boundary: all sensitive data is owned by
    /// exactly one business.
    Business,
    /// A person acting within a business (owner or employee) or on the
    /// platform itself.
    User,
    /// A ledger account holding funds.
    Account,
    /// An issued payment card.
    Card,
    /// A spend allocation within a business.
    Allocation,
    /// A balance adjustment posted to an account.
    Adjustment,
    /// An external bank account linked to a business.
    BankAccount,
    /// An uploaded transaction receipt.
    Receipt,
}

impl EntityKind {
    /// Every registered kind, in registry order.
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Business,
        EntityKind::User,
        EntityKind::Account,
        EntityKind::Card,
        EntityKind::Allocation,
        EntityKind::Adjustment,
        EntityKind::BankAccount,
        EntityKind::Receipt,
    ];

    /// Returns the stable wire prefix for this kind.
    ///
    /// Prefixes are part of the external format and never change.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            EntityKind::Business => "biz",
            EntityKind::User => "usr",
            EntityKind::Account => "acct",
            EntityKind::Card => "card",
            EntityKind::Allocation => "alloc",
            EntityKind::Adjustment => "adj",
            EntityKind::BankAccount => "bank",
            EntityKind::Receipt => "rcpt",
        }
    }

    /// Looks up a kind by its wire prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Business => write!(f, "business"),
            EntityKind::User => write!(f, "user"),
            EntityKind::Account => write!(f, "account"),
            EntityKind::Card => write!(f, "card"),
            EntityKind::Allocation => write!(f, "allocation"),
            EntityKind::Adjustment => write!(f, "adjustment"),
            EntityKind::BankAccount => write!(f, "bank-account"),
            EntityKind::Receipt => write!(f, "receipt"),
        }
    }
}

/// Compile-time tag tying a [`TypedId`] to one [`EntityKind`].
///
/// Implemented only by the marker types below; the registry is closed
/// within this crate.
pub trait IdKind: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// The registry entry this marker corresponds to.
    const KIND: EntityKind;
}

macro_rules! id_kinds {
    ($($(#[$meta:meta])* $marker:ident => $kind:ident, $alias:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $marker;

            impl IdKind for $marker {
                const KIND: EntityKind = EntityKind::$kind;
            }

            #[doc = concat!("Identifier for a ", stringify!($kind), " entity.")]
            pub type $alias = TypedId<$marker>;
        )+
    };
}

id_kinds! {
    /// Marker for [`EntityKind::Business`].
    Business => Business, BusinessId;
    /// Marker for [`EntityKind::User`].
    User => User, UserId;
    /// Marker for [`EntityKind::Account`].
    Account => Account, AccountId;
    /// Marker for [`EntityKind::Card`].
    Card => Card, CardId;
    /// Marker for [`EntityKind::Allocation`].
    Allocation => Allocation, AllocationId;
    /// Marker for [`EntityKind::Adjustment`].
    Adjustment => Adjustment, AdjustmentId;
    /// Marker for [`EntityKind::BankAccount`].
    BankAccount => BankAccount, BankAccountId;
    /// Marker for [`EntityKind::Receipt`].
    Receipt => Receipt, ReceiptId;
}

// ============================================================================
// TypedId
// ============================================================================

/// An opaque, entity-tagged identifier.
///
/// Two ids compare equal only if both the kind tag and the underlying
/// value match; ids of different kinds are different types and never meet
/// in a comparison at all.
///
/// # Examples
///
/// ```
/// use coffer_types::{AccountId, BusinessId, ParseError};
///
/// let id = AccountId::new();
/// let wire = id.to_string();
/// assert!(wire.starts_with("acct_"));
/// assert_eq!(wire.parse::<AccountId>().unwrap(), id);
///
/// // The same string is rejected under any other kind.
/// assert!(matches!(
///     wire.parse::<BusinessId>(),
///     Err(ParseError::KindMismatch { .. })
/// ));
/// ```
pub struct TypedId<K: IdKind> {
    value: Uuid,
    _kind: PhantomData<K>,
}

impl<K: IdKind> TypedId<K> {
    /// Mints a fresh identifier.
    ///
    /// Values are UUID v4 (122 random bits), so collisions within a kind
    /// are cryptographically negligible. This is the only generative
    /// constructor; there is no way to build an id from a caller-chosen
    /// value except by parsing an already-issued wire form.
    #[must_use]
    pub fn new() -> Self {
        Self::from_value(Uuid::new_v4())
    }

    const fn from_value(value: Uuid) -> Self {
        Self {
            value,
            _kind: PhantomData,
        }
    }

    /// Returns the kind tag of this identifier type.
    #[must_use]
    pub const fn kind() -> EntityKind {
        K::KIND
    }

    /// Returns the underlying UUID, for hashing or storage keys.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.value
    }

    /// Parses the wire form, checking the kind prefix.
    ///
    /// # Errors
    ///
    /// [`ParseError::KindMismatch`] if the prefix belongs to a different
    /// registered kind, [`ParseError::Malformed`] if the prefix is unknown
    /// or the remainder is not a UUID.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let Some((prefix, rest)) = input.split_once('_') else {
            return Err(ParseError::malformed(input));
        };

        match EntityKind::from_prefix(prefix) {
            Some(found) if found == K::KIND => Uuid::parse_str(rest)
                .map(Self::from_value)
                .map_err(|_| ParseError::malformed(input)),
            Some(found) => Err(ParseError::KindMismatch {
                expected: K::KIND,
                found,
            }),
            None => Err(ParseError::malformed(input)),
        }
    }

    /// Reinterprets this id as another kind, preserving the value.
    ///
    /// This is the single escape hatch from the kind system, reserved for
    /// data migrations. Every call is recorded in the audit trail as a
    /// WARN event carrying both kinds, the value, and the caller-supplied
    /// reason.
    #[must_use]
    pub fn reinterpret<K2: IdKind>(self, reason: &str) -> TypedId<K2> {
        tracing::warn!(
            from = %K::KIND,
            to = %K2::KIND,
            value = %self.value,
            reason,
            "typed id reinterpreted"
        );
        TypedId::from_value(self.value)
    }
}

// Manual impls: deriving would put unnecessary bounds on K and leak the
// PhantomData field into Debug output.

impl<K: IdKind> Clone for TypedId<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: IdKind> Copy for TypedId<K> {}

impl<K: IdKind> PartialEq for TypedId<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K: IdKind> Eq for TypedId<K> {}

impl<K: IdKind> PartialOrd for TypedId<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: IdKind> Ord for TypedId<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K: IdKind> Hash for TypedId<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K: IdKind> Debug for TypedId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl<K: IdKind> Display for TypedId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", K::KIND.prefix(), self.value)
    }
}

impl<K: IdKind> FromStr for TypedId<K> {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<K: IdKind> Serialize for TypedId<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, K: IdKind> Deserialize<'de> for TypedId<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure to parse the wire form of a [`TypedId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The prefix belongs to a different registered kind.
    #[error("expected a {expected} id, found a {found} id")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    /// The prefix is unknown or the value is not a UUID.
    #[error("malformed id {input:?}")]
    Malformed { input: String },
}

impl ParseError {
    fn malformed(input: &str) -> Self {
        ParseError::Malformed {
            input: input.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn wire_form_round_trips() {
        let id = CardId::new();
        let wire = id.to_string();
        assert_eq!(wire.parse::<CardId>().expect("round trip"), id);
    }

    #[test]
    fn wire_form_carries_kind_prefix() {
        assert!(BusinessId::new().to_string().starts_with("biz_"));
        assert!(UserId::new().to_string().starts_with("usr_"));
        assert!(AccountId::new().to_string().starts_with("acct_"));
        assert!(CardId::new().to_string().starts_with("card_"));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let user = UserId::new().to_string();
        let err = user.parse::<BusinessId>().expect_err("wrong kind");
        assert_eq!(
            err,
            ParseError::KindMismatch {
                expected: EntityKind::Business,
                found: EntityKind::User,
            }
        );
    }

    #[test_case("" ; "empty")]
    #[test_case("biz" ; "no separator")]
    #[test_case("biz_" ; "empty value")]
    #[test_case("biz_not-a-uuid" ; "bad uuid")]
    #[test_case("zzz_8f14e45f-ceea-467f-9d9e-8b7a2f6f3a01" ; "unknown prefix")]
    fn malformed_inputs_are_rejected(input: &str) {
        assert!(matches!(
            input.parse::<BusinessId>(),
            Err(ParseError::Malformed { .. })
        ));
    }

    #[test]
    fn prefixes_are_unique() {
        for a in EntityKind::ALL {
            for b in EntityKind::ALL {
                if a != b {
                    assert_ne!(a.prefix(), b.prefix());
                }
            }
        }
    }

    #[test]
    fn prefix_lookup_round_trips() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_prefix(kind.prefix()), Some(kind));
        }
        assert_eq!(EntityKind::from_prefix("nope"), None);
    }

    #[test]
    fn reinterpret_preserves_value() {
        let account = AccountId::new();
        let card: CardId = account.reinterpret("test migration");
        assert_eq!(account.as_uuid(), card.as_uuid());
    }

    #[test]
    fn serde_uses_wire_form() {
        let id = AccountId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));

        let back: AccountId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn serde_rejects_kind_mismatch() {
        let json = serde_json::to_string(&UserId::new()).expect("serialize");
        let result: Result<BusinessId, _> = serde_json::from_str(&json);
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn parse_is_left_inverse_of_display(bytes in any::<[u8; 16]>()) {
            let id = AccountId::from_value(uuid::Builder::from_random_bytes(bytes).into_uuid());
            prop_assert_eq!(id.to_string().parse::<AccountId>().unwrap(), id);
        }
    }
}
