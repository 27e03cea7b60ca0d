//! Enforced data-access operations.
//!
//! Every operation here follows the same discipline:
//!
//! 1. a [`PermissionRequirement`] is declared as a `const` next to the
//!    operation — the enforcement scanner verifies no operation is missing
//!    one;
//! 2. the operation calls [`AccessGuard::require`] before touching the
//!    store, so a denial aborts with no side effects and nothing to roll
//!    back;
//! 3. sensitive fields pass through the [`FieldCodec`] on the way in and
//!    out — the store only ever sees ciphertext.
//!
//! For id-keyed operations the row is looked up first to learn its owning
//! business; ownership resolution is not a side effect, and no field is
//! decoded until the guard allows.

use std::sync::Arc;

use coffer_crypto::{
    FieldCodec, FieldShape, KeyConfigError, KeyRing, KeyRingConfig, KeyVersionId,
};
use coffer_rbac::{AccessGuard, PermissionRequirement, PrincipalContext, Role};
use coffer_types::{AccountId, BusinessId, CardId};

use crate::error::{CofferError, Result};
use crate::store::{Account, Card, EntityStore, FieldUse};

/// Nine-digit ABA routing numbers.
const ROUTING_SHAPE: FieldShape = FieldShape::DigitsFixed(9);

/// Account numbers and PANs: digit strings of varying length.
const NUMBER_SHAPE: FieldShape = FieldShape::Digits;

impl FieldUse {
    const fn shape(self) -> FieldShape {
        match self {
            FieldUse::RoutingNumber => ROUTING_SHAPE,
            FieldUse::AccountNumber | FieldUse::Pan => NUMBER_SHAPE,
        }
    }
}

pub const REGISTER_BUSINESS: PermissionRequirement =
    PermissionRequirement::platform("business.register", &[Role::GlobalAdmin]);

pub const LIST_BUSINESSES: PermissionRequirement =
    PermissionRequirement::platform("business.list", &[Role::GlobalAdmin, Role::GlobalViewer]);

pub const OPEN_ACCOUNT: PermissionRequirement =
    PermissionRequirement::tenant("account.open", &[Role::Owner, Role::Admin]);

pub const READ_ACCOUNT: PermissionRequirement = PermissionRequirement::tenant(
    "account.read",
    &[Role::Owner, Role::Admin, Role::Bookkeeper],
);

pub const UPDATE_ACCOUNT_NUMBER: PermissionRequirement =
    PermissionRequirement::tenant("account.update-number", &[Role::Owner, Role::Admin]);

pub const ISSUE_CARD: PermissionRequirement =
    PermissionRequirement::tenant("card.issue", &[Role::Owner, Role::Admin]);

pub const READ_CARD: PermissionRequirement = PermissionRequirement::tenant(
    "card.read",
    &[Role::Owner, Role::Admin, Role::Employee],
);

pub const READ_CARD_PAN: PermissionRequirement =
    PermissionRequirement::tenant("card.reveal-pan", &[Role::Owner]);

pub const ROTATE_KEYS: PermissionRequirement =
    PermissionRequirement::platform("keys.rotate", &[Role::GlobalAdmin]);

pub const DESTROY_KEY_VERSION: PermissionRequirement =
    PermissionRequirement::platform("keys.destroy", &[Role::GlobalAdmin]);

pub const REENCRYPT_FIELDS: PermissionRequirement =
    PermissionRequirement::platform("keys.reencrypt", &[Role::GlobalAdmin]);

/// An account read back through the enforcement layer, fields decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub id: AccountId,
    pub owner: BusinessId,
    pub routing_number: String,
    pub account_number: String,
}

/// The operations facade: the key ring, field codec, access guard, and
/// entity store wired together behind enforced entry points.
///
/// Cheap to share; all methods take `&self` and the only synchronization
/// is inside the ring and the store.
#[derive(Debug)]
pub struct Coffer {
    codec: FieldCodec,
    guard: AccessGuard,
    store: EntityStore,
}

impl Coffer {
    /// Builds a facade over an existing key ring.
    #[must_use]
    pub fn new(ring: Arc<KeyRing>) -> Self {
        Self {
            codec: FieldCodec::new(ring),
            guard: AccessGuard::new(),
            store: EntityStore::default(),
        }
    }

    /// Builds a facade whose ring is loaded from the process environment.
    ///
    /// # Errors
    ///
    /// [`KeyConfigError`] when key material is missing or malformed; the
    /// facade never starts with a defaulted key set.
    pub fn from_env() -> std::result::Result<Self, KeyConfigError> {
        Ok(Self::new(Arc::new(KeyRingConfig::from_env()?.into_ring())))
    }

    /// The ring backing this facade, for operator tooling.
    #[must_use]
    pub fn ring(&self) -> &Arc<KeyRing> {
        self.codec.ring()
    }

    // ------------------------------------------------------------------
    // Businesses
    // ------------------------------------------------------------------

    /// Registers a new tenant. Platform-only.
    pub fn register_business(&self, principal: &PrincipalContext) -> Result<BusinessId> {
        self.guard.require(principal, &REGISTER_BUSINESS, None)?;

        let id = BusinessId::new();
        self.store.insert_business(id);
        tracing::info!(business = %id, "business registered");
        Ok(id)
    }

    /// Lists every registered tenant. Platform-only.
    pub fn platform_list_businesses(
        &self,
        principal: &PrincipalContext,
    ) -> Result<Vec<BusinessId>> {
        self.guard.require(principal, &LIST_BUSINESSES, None)?;
        Ok(self.store.list_businesses())
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Opens a ledger account under `business`, encrypting the routing and
    /// account numbers before they reach the store.
    pub fn open_account(
        &self,
        principal: &PrincipalContext,
        business: BusinessId,
        routing_number: &str,
        account_number: &str,
    ) -> Result<AccountId> {
        self.guard.require(principal, &OPEN_ACCOUNT, Some(business))?;
        self.ensure_business(business)?;

        let account = Account {
            id: AccountId::new(),
            owner: business,
            routing_number: self.codec.encode(routing_number, ROUTING_SHAPE)?,
            account_number: self.codec.encode(account_number, NUMBER_SHAPE)?,
        };
        let id = account.id;
        self.store.insert_account(account);
        tracing::info!(account = %id, business = %business, "account opened");
        Ok(id)
    }

    /// Reads an account, decoding its sensitive fields.
    pub fn read_account(
        &self,
        principal: &PrincipalContext,
        id: AccountId,
    ) -> Result<AccountView> {
        let account = self
            .store
            .account(id)
            .ok_or(CofferError::AccountNotFound(id))?;
        self.guard
            .require(principal, &READ_ACCOUNT, Some(account.owner))?;

        Ok(AccountView {
            id: account.id,
            owner: account.owner,
            routing_number: self.codec.decode(&account.routing_number, ROUTING_SHAPE)?,
            account_number: self.codec.decode(&account.account_number, NUMBER_SHAPE)?,
        })
    }

    /// Replaces an account's number; the new value is encrypted under the
    /// current ACTIVE key version.
    pub fn update_account_number(
        &self,
        principal: &PrincipalContext,
        id: AccountId,
        account_number: &str,
    ) -> Result<()> {
        let account = self
            .store
            .account(id)
            .ok_or(CofferError::AccountNotFound(id))?;
        self.guard
            .require(principal, &UPDATE_ACCOUNT_NUMBER, Some(account.owner))?;

        let encoded = self.codec.encode(account_number, NUMBER_SHAPE)?;
        if !self.store.set_account_number(id, encoded) {
            return Err(CofferError::AccountNotFound(id));
        }
        tracing::info!(account = %id, "account number updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cards
    // ------------------------------------------------------------------

    /// Issues a card under `business`. The PAN is stored format-preserved;
    /// only its last four digits are kept in the clear.
    pub fn issue_card(
        &self,
        principal: &PrincipalContext,
        business: BusinessId,
        pan: &str,
    ) -> Result<CardId> {
        self.guard.require(principal, &ISSUE_CARD, Some(business))?;
        self.ensure_business(business)?;

        let encrypted = self.codec.encode(pan, NUMBER_SHAPE)?;
        let last_four = pan[pan.len().saturating_sub(4)..].to_string();
        let card = Card {
            id: CardId::new(),
            owner: business,
            pan: encrypted,
            last_four,
        };
        let id = card.id;
        self.store.insert_card(card);
        tracing::info!(card = %id, business = %business, "card issued");
        Ok(id)
    }

    /// Returns a card's clear last four digits, for masked display.
    pub fn card_last_four(&self, principal: &PrincipalContext, id: CardId) -> Result<String> {
        let card = self.store.card(id).ok_or(CofferError::CardNotFound(id))?;
        self.guard
            .require(principal, &READ_CARD, Some(card.owner))?;
        Ok(card.last_four)
    }

    /// Reveals a card's full PAN. Owner-only; every grant and denial is
    /// audited.
    pub fn read_card_pan(&self, principal: &PrincipalContext, id: CardId) -> Result<String> {
        let card = self.store.card(id).ok_or(CofferError::CardNotFound(id))?;
        self.guard
            .require(principal, &READ_CARD_PAN, Some(card.owner))?;

        Ok(self.codec.decode(&card.pan, NUMBER_SHAPE)?)
    }

    // ------------------------------------------------------------------
    // Key lifecycle (operator surface)
    // ------------------------------------------------------------------

    /// Rotates the key ring: new ACTIVE version, previous demoted to
    /// RETIRED. Existing ciphertexts keep decrypting.
    pub fn rotate_keys(&self, principal: &PrincipalContext) -> Result<KeyVersionId> {
        self.guard.require(principal, &ROTATE_KEYS, None)?;
        Ok(self.codec.ring().rotate())
    }

    /// Destroys a RETIRED key version. Irreversible; run
    /// [`Self::reencrypt_stored_fields`] first or data tagged with the
    /// version is lost.
    pub fn destroy_key_version(
        &self,
        principal: &PrincipalContext,
        version: KeyVersionId,
    ) -> Result<()> {
        self.guard.require(principal, &DESTROY_KEY_VERSION, None)?;
        self.codec.ring().destroy(version)?;
        Ok(())
    }

    /// Re-encrypts every stored sensitive field under the current ACTIVE
    /// version, returning the number of fields rewritten. The migration
    /// step before a version is destroyed.
    pub fn reencrypt_stored_fields(&self, principal: &PrincipalContext) -> Result<usize> {
        self.guard.require(principal, &REENCRYPT_FIELDS, None)?;

        let rewritten = self
            .store
            .migrate_fields(|field, field_use| self.codec.reencode(field, field_use.shape()))?;
        tracing::info!(fields = rewritten, "stored fields re-encrypted");
        Ok(rewritten)
    }

    fn ensure_business(&self, id: BusinessId) -> Result<()> {
        if self.store.business_exists(id) {
            Ok(())
        } else {
            Err(CofferError::BusinessNotFound(id))
        }
    }
}
