use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    account::{Account, AccountNumber, AccountStatus, AccountType, ContactUpdate, Customer},
    record::{ClosureRecord, OperatorId, TransactionId, TransactionKind, TransactionRecord},
};

use super::{AccountStore, IdentityField, Ledger, StoreError};

struct AccountTables {
    accounts: BTreeMap<AccountNumber, Account>,
    national_ids: HashSet<String>,
    pans: HashSet<String>,
    next_number: AccountNumber,
}

pub struct InMemoryAccountStore {
    tables: RwLock<AccountTables>,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::numbered_after(0)
    }
}

/// Comparison key of a national id or PAN: case and spacing do not matter.
fn identity_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl InMemoryAccountStore {
    /// Empty store whose first account gets number `last + 1`.
    pub fn numbered_after(last: AccountNumber) -> Self {
        Self {
            tables: RwLock::new(AccountTables {
                accounts: BTreeMap::new(),
                national_ids: HashSet::new(),
                pans: HashSet::new(),
                next_number: last + 1,
            }),
        }
    }

    /// Replaces the account with `f(current)` while holding the write lock.
    fn install<F>(&self, account_number: AccountNumber, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Account) -> Result<Account, StoreError>,
    {
        let mut tables = self.tables.write();
        let slot = tables
            .accounts
            .get_mut(&account_number)
            .ok_or(StoreError::NotFound { account_number })?;
        let next = f(slot)?;
        *slot = next;
        Ok(())
    }
}

impl AccountStore for InMemoryAccountStore {
    fn create(
        &self,
        owner: Customer,
        account_type: AccountType,
        initial_balance: Decimal,
    ) -> Result<AccountNumber, StoreError> {
        if initial_balance < Decimal::ZERO {
            return Err(StoreError::InvalidBalance {
                balance: initial_balance,
            });
        }
        let national_id = identity_key(&owner.national_id);
        let pan = identity_key(&owner.pan);
        let mut tables = self.tables.write();
        if tables.national_ids.contains(&national_id) {
            return Err(StoreError::DuplicateIdentity {
                field: IdentityField::NationalId,
            });
        }
        if tables.pans.contains(&pan) {
            return Err(StoreError::DuplicateIdentity {
                field: IdentityField::Pan,
            });
        }

        let account_number = tables.next_number;
        tables.next_number += 1;
        tables.national_ids.insert(national_id);
        tables.pans.insert(pan);
        tables.accounts.insert(
            account_number,
            Account::new(account_number, owner, account_type, initial_balance),
        );
        Ok(account_number)
    }

    fn get(&self, account_number: AccountNumber) -> Result<Account, StoreError> {
        self.tables
            .read()
            .accounts
            .get(&account_number)
            .cloned()
            .ok_or(StoreError::NotFound { account_number })
    }

    fn get_active(&self, account_number: AccountNumber) -> Result<Account, StoreError> {
        let account = self.get(account_number)?;
        if !account.is_active() {
            debug!(account_number, "Lookup of closed account reported as not found");
            return Err(StoreError::NotFound { account_number });
        }
        Ok(account)
    }

    fn set_balance(
        &self,
        account_number: AccountNumber,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        if new_balance < Decimal::ZERO {
            return Err(StoreError::InvalidBalance {
                balance: new_balance,
            });
        }
        self.install(account_number, |current| {
            if !current.is_active() {
                return Err(StoreError::AccountClosed { account_number });
            }
            Ok(current.with_balance(new_balance))
        })
    }

    fn close(&self, account_number: AccountNumber) -> Result<(), StoreError> {
        self.install(account_number, |current| {
            if !current.is_active() {
                return Err(StoreError::AlreadyClosed { account_number });
            }
            Ok(current.with_status(AccountStatus::Closed))
        })
    }

    fn patch_contact_field(
        &self,
        account_number: AccountNumber,
        update: ContactUpdate,
    ) -> Result<(), StoreError> {
        self.install(account_number, |current| {
            if !current.is_active() {
                return Err(StoreError::AccountClosed { account_number });
            }
            Ok(current.with_contact_update(update))
        })
    }

    fn revert_to(&self, snapshot: &Account) -> Result<(), StoreError> {
        self.install(snapshot.account_number(), |current| {
            Ok(current
                .with_balance(snapshot.balance())
                .with_status(snapshot.status()))
        })
    }

    fn list(&self) -> Vec<Account> {
        self.tables.read().accounts.values().cloned().collect()
    }

    fn active_count(&self) -> usize {
        self.tables
            .read()
            .accounts
            .values()
            .filter(|account| account.is_active())
            .count()
    }
}

/// Point in time view of ledger records, iterated most recent first.
///
/// Iteration is lazy and can be restarted any number of times with
/// [`TransactionHistory::iter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionHistory {
    // oldest first, as appended
    records: Vec<Arc<TransactionRecord>>,
}

impl TransactionHistory {
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TransactionRecord> + ExactSizeIterator {
        self.records.iter().rev().map(|record| &**record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a TransactionHistory {
    type Item = &'a TransactionRecord;
    type IntoIter = Box<dyn Iterator<Item = &'a TransactionRecord> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[derive(Default)]
struct LedgerTables {
    records: Vec<Arc<TransactionRecord>>,
    ids: HashSet<TransactionId>,
    by_account: HashMap<AccountNumber, Vec<usize>>,
    closures: HashMap<AccountNumber, ClosureRecord>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    tables: RwLock<LedgerTables>,
}

impl InMemoryLedger {
    /// Stores an already built record, drawing a fresh id on the (negligible)
    /// chance of a collision.
    pub fn insert(&self, mut record: TransactionRecord) -> Result<TransactionId, StoreError> {
        if record.amount() <= Decimal::ZERO {
            return Err(StoreError::InvalidAmount {
                amount: record.amount(),
            });
        }
        let mut tables = self.tables.write();
        while tables.ids.contains(record.transaction_id()) {
            record.regenerate_id();
        }
        let transaction_id = record.transaction_id().clone();
        let index = tables.records.len();
        tables.ids.insert(transaction_id.clone());
        tables
            .by_account
            .entry(record.account_number())
            .or_default()
            .push(index);
        tables.records.push(Arc::new(record));
        Ok(transaction_id)
    }

    pub fn insert_closure(&self, closure: ClosureRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let account_number = closure.account_number();
        if tables.closures.contains_key(&account_number) {
            return Err(StoreError::AlreadyClosed { account_number });
        }
        tables.closures.insert(account_number, closure);
        Ok(())
    }

    pub fn contains_transaction(&self, transaction_id: &TransactionId) -> bool {
        self.tables.read().ids.contains(transaction_id)
    }

    pub fn has_closure(&self, account_number: AccountNumber) -> bool {
        self.tables.read().closures.contains_key(&account_number)
    }
}

impl Ledger for InMemoryLedger {
    fn append(
        &self,
        account_number: AccountNumber,
        kind: TransactionKind,
        amount: Decimal,
        description: &str,
    ) -> Result<TransactionId, StoreError> {
        self.insert(TransactionRecord::new(
            account_number,
            kind,
            amount,
            description,
        ))
    }

    fn record_closure(
        &self,
        account_number: AccountNumber,
        reason: &str,
        final_balance: Decimal,
        handled_by: OperatorId,
    ) -> Result<(), StoreError> {
        self.insert_closure(ClosureRecord::new(
            account_number,
            reason,
            final_balance,
            handled_by,
        ))
    }

    fn list_by_account(&self, account_number: AccountNumber) -> TransactionHistory {
        let tables = self.tables.read();
        let records: Vec<Arc<TransactionRecord>> = tables
            .by_account
            .get(&account_number)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&index| Arc::clone(&tables.records[index]))
                    .collect()
            })
            .unwrap_or_default();
        TransactionHistory { records }
    }

    fn list_all(&self) -> TransactionHistory {
        TransactionHistory {
            records: self.tables.read().records.clone(),
        }
    }

    fn closure(&self, account_number: AccountNumber) -> Option<ClosureRecord> {
        self.tables.read().closures.get(&account_number).cloned()
    }
}
