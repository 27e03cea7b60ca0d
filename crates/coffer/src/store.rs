//! In-memory entity store.
//!
//! A stand-in for the persistence layer, keyed by typed ids. Sensitive
//! columns are held exactly as the real layer persists them — an
//! [`EncryptedField`] pair of key version and ciphertext — so plaintext
//! never enters the store. The store performs no access checks of its own;
//! it is reachable only through the enforced operations in
//! [`ops`](crate::ops).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use coffer_crypto::EncryptedField;
use coffer_types::{AccountId, BusinessId, CardId};

/// A ledger account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Account {
    pub id: AccountId,
    pub owner: BusinessId,
    pub routing_number: EncryptedField,
    pub account_number: EncryptedField,
}

/// An issued card row. The clear last four digits are kept for display;
/// the full PAN only as ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Card {
    pub id: CardId,
    pub owner: BusinessId,
    pub pan: EncryptedField,
    pub last_four: String,
}

#[derive(Debug, Default)]
struct Tables {
    businesses: BTreeSet<BusinessId>,
    accounts: BTreeMap<AccountId, Account>,
    cards: BTreeMap<CardId, Card>,
}

/// Shared, lock-protected tables.
#[derive(Debug, Default)]
pub(crate) struct EntityStore {
    tables: RwLock<Tables>,
}

impl EntityStore {
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_business(&self, id: BusinessId) {
        self.write().businesses.insert(id);
    }

    pub fn business_exists(&self, id: BusinessId) -> bool {
        self.read().businesses.contains(&id)
    }

    pub fn list_businesses(&self) -> Vec<BusinessId> {
        self.read().businesses.iter().copied().collect()
    }

    pub fn insert_account(&self, account: Account) {
        self.write().accounts.insert(account.id, account);
    }

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.read().accounts.get(&id).cloned()
    }

    pub fn set_account_number(&self, id: AccountId, number: EncryptedField) -> bool {
        match self.write().accounts.get_mut(&id) {
            Some(account) => {
                account.account_number = number;
                true
            }
            None => false,
        }
    }

    pub fn insert_card(&self, card: Card) {
        self.write().cards.insert(card.id, card);
    }

    pub fn card(&self, id: CardId) -> Option<Card> {
        self.read().cards.get(&id).cloned()
    }

    /// Applies `migrate` to every stored encrypted column, writing back the
    /// replacement. Returns the number of fields rewritten; stops at the
    /// first failure so a partially-migrated store is never reported as
    /// fully migrated.
    pub fn migrate_fields<E>(
        &self,
        mut migrate: impl FnMut(&EncryptedField, FieldUse) -> Result<EncryptedField, E>,
    ) -> Result<usize, E> {
        let mut tables = self.write();
        let mut rewritten = 0;

        for account in tables.accounts.values_mut() {
            account.routing_number = migrate(&account.routing_number, FieldUse::RoutingNumber)?;
            account.account_number = migrate(&account.account_number, FieldUse::AccountNumber)?;
            rewritten += 2;
        }
        for card in tables.cards.values_mut() {
            card.pan = migrate(&card.pan, FieldUse::Pan)?;
            rewritten += 1;
        }
        Ok(rewritten)
    }
}

/// Which sensitive column a field came from, so migration can apply the
/// matching shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldUse {
    RoutingNumber,
    AccountNumber,
    Pan,
}

#[cfg(test)]
mod tests {
    use coffer_crypto::KeyVersionId;

    use super::*;

    fn field(ciphertext: &str) -> EncryptedField {
        EncryptedField {
            key_version: KeyVersionId::new(1),
            ciphertext: ciphertext.to_string(),
        }
    }

    #[test]
    fn accounts_are_keyed_by_id() {
        let store = EntityStore::default();
        let owner = BusinessId::new();
        let id = AccountId::new();
        store.insert_account(Account {
            id,
            owner,
            routing_number: field("021000021"),
            account_number: field("123456789"),
        });

        let row = store.account(id).expect("present");
        assert_eq!(row.owner, owner);
        assert_eq!(store.account(AccountId::new()), None);
    }

    #[test]
    fn set_account_number_reports_missing_rows() {
        let store = EntityStore::default();
        assert!(!store.set_account_number(AccountId::new(), field("999999999")));
    }

    #[test]
    fn migrate_touches_every_encrypted_column() {
        let store = EntityStore::default();
        let owner = BusinessId::new();
        let account = AccountId::new();
        store.insert_account(Account {
            id: account,
            owner,
            routing_number: field("a"),
            account_number: field("b"),
        });
        store.insert_card(Card {
            id: CardId::new(),
            owner,
            pan: field("c"),
            last_four: "1111".to_string(),
        });

        let mut uses = Vec::new();
        let rewritten = store
            .migrate_fields(|old, field_use| {
                uses.push(field_use);
                Ok::<_, ()>(EncryptedField {
                    key_version: KeyVersionId::new(2),
                    ciphertext: old.ciphertext.clone(),
                })
            })
            .expect("migrate");

        assert_eq!(rewritten, 3);
        assert_eq!(
            uses,
            vec![FieldUse::RoutingNumber, FieldUse::AccountNumber, FieldUse::Pan]
        );
        assert_eq!(
            store.account(account).expect("present").routing_number.key_version,
            KeyVersionId::new(2)
        );
    }
}
