use std::{fmt, sync::Arc, time::Duration};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{Account, AccountNumber, AccountType, ContactUpdate, Customer},
    config::EngineConfig,
    coordinator::locks::AccountLocks,
    record::{ClosureRecord, OperatorId, TransactionId, TransactionKind},
};

pub mod in_memory;
pub mod journal;

pub use in_memory::{InMemoryAccountStore, InMemoryLedger, TransactionHistory};
pub use journal::JournaledLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    NationalId,
    Pan,
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityField::NationalId => f.write_str("national id"),
            IdentityField::Pan => f.write_str("PAN"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Account {account_number} not found")]
    NotFound { account_number: AccountNumber },
    #[error("Account {account_number} is closed")]
    AccountClosed { account_number: AccountNumber },
    #[error("Account {account_number} is already closed")]
    AlreadyClosed { account_number: AccountNumber },
    #[error("An account with this {field} already exists")]
    DuplicateIdentity { field: IdentityField },
    #[error("Balance {balance} is invalid, it must not be negative")]
    InvalidBalance { balance: Decimal },
    #[error("Ledger amount {amount} must be positive")]
    InvalidAmount { amount: Decimal },
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Owner of all [`Account`] entities.
///
/// Every mutation installs a complete new snapshot, so readers see an account
/// either before or after a change, never half way.
pub trait AccountStore: Send + Sync {
    /// Creates an Active account, rejecting an owner whose national id or PAN is
    /// already used by any account, open or closed.
    fn create(
        &self,
        owner: Customer,
        account_type: AccountType,
        initial_balance: Decimal,
    ) -> Result<AccountNumber, StoreError>;

    fn get(&self, account_number: AccountNumber) -> Result<Account, StoreError>;

    /// Like [`AccountStore::get`], but a Closed account is reported as `NotFound`.
    fn get_active(&self, account_number: AccountNumber) -> Result<Account, StoreError>;

    /// The only way to change a balance. Callers must hold the account lock.
    fn set_balance(
        &self,
        account_number: AccountNumber,
        new_balance: Decimal,
    ) -> Result<(), StoreError>;

    fn close(&self, account_number: AccountNumber) -> Result<(), StoreError>;

    /// Contact edits do not touch money and need no account lock.
    fn patch_contact_field(
        &self,
        account_number: AccountNumber,
        update: ContactUpdate,
    ) -> Result<(), StoreError>;

    /// Compensation for an aborted operation: puts back the balance and status
    /// of `snapshot`, keeping any contact edits made since.
    fn revert_to(&self, snapshot: &Account) -> Result<(), StoreError>;

    /// All accounts ordered by account number.
    fn list(&self) -> Vec<Account>;

    fn active_count(&self) -> usize;
}

/// Append-only owner of transaction and closure records.
pub trait Ledger: Send + Sync {
    fn append(
        &self,
        account_number: AccountNumber,
        kind: TransactionKind,
        amount: Decimal,
        description: &str,
    ) -> Result<TransactionId, StoreError>;

    fn record_closure(
        &self,
        account_number: AccountNumber,
        reason: &str,
        final_balance: Decimal,
        handled_by: OperatorId,
    ) -> Result<(), StoreError>;

    fn list_by_account(&self, account_number: AccountNumber) -> TransactionHistory;

    fn list_all(&self) -> TransactionHistory;

    fn closure(&self, account_number: AccountNumber) -> Option<ClosureRecord>;
}

/// The single logical store shared by every coordinator: accounts, ledger and
/// the per-account lock table.
pub struct Storage<S, L> {
    accounts: S,
    ledger: L,
    locks: AccountLocks,
}

impl<S, L> Storage<S, L>
where
    S: AccountStore,
    L: Ledger,
{
    pub fn new(accounts: S, ledger: L, lock_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            accounts,
            ledger,
            locks: AccountLocks::new(lock_timeout),
        })
    }

    pub fn accounts(&self) -> &S {
        &self.accounts
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub(crate) fn locks(&self) -> &AccountLocks {
        &self.locks
    }
}

impl Storage<InMemoryAccountStore, InMemoryLedger> {
    pub fn in_memory(config: &EngineConfig) -> Arc<Self> {
        Self::new(
            InMemoryAccountStore::default(),
            InMemoryLedger::default(),
            config.lock_timeout(),
        )
    }
}
