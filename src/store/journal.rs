//! Durable ledger: every record is written to an append-only JSON lines file
//! before it becomes visible in memory. Reopening a journal replays it, so
//! records and closures survive restarts.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    account::AccountNumber,
    record::{ClosureRecord, OperatorId, TransactionId, TransactionKind, TransactionRecord},
};

use super::{InMemoryLedger, Ledger, StoreError, TransactionHistory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEntry {
    Transaction(TransactionRecord),
    Closure(ClosureRecord),
}

impl JournalEntry {
    pub fn account_number(&self) -> AccountNumber {
        match self {
            JournalEntry::Transaction(record) => record.account_number(),
            JournalEntry::Closure(closure) => closure.account_number(),
        }
    }
}

pub struct JournaledLedger {
    path: PathBuf,
    // held for the whole write-then-publish sequence
    file: Mutex<File>,
    memory: InMemoryLedger,
    last_account_number: Option<AccountNumber>,
}

impl JournaledLedger {
    /// Opens `path` for appending, creating it when missing, and loads the
    /// entries already in it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| {
                StoreError::Storage(format!("Failed to open journal `{}`: {err}", path.display()))
            })?;

        let memory = InMemoryLedger::default();
        let mut last_account_number = None;
        let entries = read_journal(&path)?;
        let replayed = entries.len();
        for entry in entries {
            last_account_number = last_account_number.max(Some(entry.account_number()));
            match entry {
                JournalEntry::Transaction(record) => {
                    memory.insert(record)?;
                }
                JournalEntry::Closure(closure) => memory.insert_closure(closure)?,
            }
        }
        if replayed > 0 {
            info!(journal = %path.display(), replayed, "Replayed journal");
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
            memory,
            last_account_number,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest account number the journal holds records for.
    pub fn last_account_number(&self) -> Option<AccountNumber> {
        self.last_account_number
    }

    /// Appends one line in a single unbuffered write. On failure the file is
    /// cut back to its previous length, so a rejected entry never resurfaces.
    fn write_entry(file: &mut File, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(entry)
            .map_err(|err| StoreError::Storage(format!("Failed to encode journal entry: {err}")))?;
        line.push('\n');
        let committed_len = file.metadata().map(|meta| meta.len());
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|err| {
                error!(%err, "Journal write failed");
                if let Ok(len) = committed_len {
                    if let Err(err) = file.set_len(len) {
                        error!(%err, len, "Failed to truncate journal after a failed write");
                    }
                }
                StoreError::Storage(format!("Failed to write journal entry: {err}"))
            })
    }
}

/// Reads every entry of a journal, oldest first.
pub fn read_journal(path: impl AsRef<Path>) -> Result<Vec<JournalEntry>, StoreError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| {
        StoreError::Storage(format!("Failed to open journal `{}`: {err}", path.display()))
    })?;
    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| StoreError::Storage(err.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|err| {
            StoreError::Storage(format!("Corrupt journal line {}: {err}", index + 1))
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

impl Ledger for JournaledLedger {
    fn append(
        &self,
        account_number: AccountNumber,
        kind: TransactionKind,
        amount: Decimal,
        description: &str,
    ) -> Result<TransactionId, StoreError> {
        if amount <= Decimal::ZERO {
            return Err(StoreError::InvalidAmount { amount });
        }
        let mut file = self.file.lock();
        let mut record = TransactionRecord::new(account_number, kind, amount, description);
        while self.memory.contains_transaction(record.transaction_id()) {
            record.regenerate_id();
        }
        Self::write_entry(&mut file, &JournalEntry::Transaction(record.clone()))?;
        self.memory.insert(record)
    }

    fn record_closure(
        &self,
        account_number: AccountNumber,
        reason: &str,
        final_balance: Decimal,
        handled_by: OperatorId,
    ) -> Result<(), StoreError> {
        let mut file = self.file.lock();
        if self.memory.has_closure(account_number) {
            return Err(StoreError::AlreadyClosed { account_number });
        }
        let closure = ClosureRecord::new(account_number, reason, final_balance, handled_by);
        Self::write_entry(&mut file, &JournalEntry::Closure(closure.clone()))?;
        self.memory.insert_closure(closure)
    }

    fn list_by_account(&self, account_number: AccountNumber) -> TransactionHistory {
        self.memory.list_by_account(account_number)
    }

    fn list_all(&self) -> TransactionHistory {
        self.memory.list_all()
    }

    fn closure(&self, account_number: AccountNumber) -> Option<ClosureRecord> {
        self.memory.closure(account_number)
    }
}
