use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::TransactionKind;

pub type AccountNumber = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Savings,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub mobile: String,
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// The contact attributes an operator may edit after opening, each carrying
/// its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactUpdate {
    Mobile(String),
    Email(String),
    Address(String),
    City(String),
    State(String),
    PostalCode(String),
}

impl ContactUpdate {
    pub fn field_name(&self) -> &'static str {
        match self {
            ContactUpdate::Mobile(_) => "mobile",
            ContactUpdate::Email(_) => "email",
            ContactUpdate::Address(_) => "address",
            ContactUpdate::City(_) => "city",
            ContactUpdate::State(_) => "state",
            ContactUpdate::PostalCode(_) => "postal_code",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ContactUpdate::Mobile(value)
            | ContactUpdate::Email(value)
            | ContactUpdate::Address(value)
            | ContactUpdate::City(value)
            | ContactUpdate::State(value)
            | ContactUpdate::PostalCode(value) => value,
        }
    }

    pub fn apply(self, contact: &mut ContactDetails) {
        match self {
            ContactUpdate::Mobile(value) => contact.mobile = value,
            ContactUpdate::Email(value) => contact.email = Some(value),
            ContactUpdate::Address(value) => contact.address = value,
            ContactUpdate::City(value) => contact.city = value,
            ContactUpdate::State(value) => contact.state = value,
            ContactUpdate::PostalCode(value) => contact.postal_code = value,
        }
    }
}

/// Account holder. `national_id` and `pan` are unique across all accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub national_id: String,
    pub pan: String,
    pub contact: ContactDetails,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account {account_number} is closed, no further operations are allowed")]
    AccountClosed { account_number: AccountNumber },
    #[error("Account {account_number} is already closed")]
    AlreadyClosed { account_number: AccountNumber },
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Balance would overflow")]
    BalanceOverflow,
}

/// Outcome of a validated deposit or withdrawal, not yet installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    account_number: AccountNumber,
    owner: Customer,
    account_type: AccountType,
    balance: Decimal,
    status: AccountStatus,
    created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        account_number: AccountNumber,
        owner: Customer,
        account_type: AccountType,
        balance: Decimal,
    ) -> Self {
        Self {
            account_number,
            owner,
            account_type,
            balance,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn account_number(&self) -> AccountNumber {
        self.account_number
    }

    pub fn owner(&self) -> &Customer {
        &self.owner
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn with_balance(&self, balance: Decimal) -> Self {
        Self {
            balance,
            ..self.clone()
        }
    }

    pub fn with_status(&self, status: AccountStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn with_contact_update(&self, update: ContactUpdate) -> Self {
        let mut next = self.clone();
        update.apply(&mut next.owner.contact);
        next
    }

    /// Decides whether `amount` may move in the direction of `kind`. The account
    /// itself is untouched, the caller installs `new_balance`.
    pub fn handle_movement(
        &self,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<BalanceChange, AccountError> {
        if !self.is_active() {
            return Err(AccountError::AccountClosed {
                account_number: self.account_number,
            });
        }

        let new_balance = match kind {
            TransactionKind::Deposit => self
                .balance
                .checked_add(amount)
                .ok_or(AccountError::BalanceOverflow)?,
            TransactionKind::Withdrawal => {
                if amount > self.balance {
                    return Err(AccountError::InsufficientFunds {
                        requested: amount,
                        available: self.balance,
                    });
                }
                self.balance - amount
            }
        };

        Ok(BalanceChange {
            kind,
            amount,
            previous_balance: self.balance,
            new_balance,
        })
    }

    /// Returns the balance to freeze at closure.
    pub fn handle_closure(&self) -> Result<Decimal, AccountError> {
        if !self.is_active() {
            return Err(AccountError::AlreadyClosed {
                account_number: self.account_number,
            });
        }
        Ok(self.balance)
    }
}
