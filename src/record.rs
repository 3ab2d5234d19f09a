use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::AccountNumber;

/// Globally unique transaction identifier, `TXN` followed by the 32 upper case
/// hex digits of a random v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub const PREFIX: &'static str = "TXN";
    pub const LEN: usize = Self::PREFIX.len() + 32;

    pub fn generate() -> Self {
        let random = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(format!("{}{random}", Self::PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

/// Identity of the authenticated employee performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(u32);

impl OperatorId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    transaction_id: TransactionId,
    account_number: AccountNumber,
    kind: TransactionKind,
    amount: Decimal,
    description: String,
    timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        account_number: AccountNumber,
        kind: TransactionKind,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::generate(),
            account_number,
            kind,
            amount,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn account_number(&self) -> AccountNumber {
        self.account_number
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Effect of this record on the account balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Deposit => self.amount,
            TransactionKind::Withdrawal => -self.amount,
        }
    }

    pub(crate) fn regenerate_id(&mut self) {
        self.transaction_id = TransactionId::generate();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRecord {
    account_number: AccountNumber,
    reason: String,
    final_balance: Decimal,
    handled_by: OperatorId,
    timestamp: DateTime<Utc>,
}

impl ClosureRecord {
    pub fn new(
        account_number: AccountNumber,
        reason: impl Into<String>,
        final_balance: Decimal,
        handled_by: OperatorId,
    ) -> Self {
        Self {
            account_number,
            reason: reason.into(),
            final_balance,
            handled_by,
            timestamp: Utc::now(),
        }
    }

    pub fn account_number(&self) -> AccountNumber {
        self.account_number
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn final_balance(&self) -> Decimal {
        self.final_balance
    }

    pub fn handled_by(&self) -> OperatorId {
        self.handled_by
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
