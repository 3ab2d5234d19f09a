use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    account::{Account, AccountError, AccountNumber, AccountType, Customer},
    command::{self, CommandError, INITIAL_DEPOSIT_DESCRIPTION, MovementCommand},
    record::{OperatorId, TransactionId, TransactionKind},
    store::{AccountStore, Ledger, Storage, StoreError},
};

use self::locks::AccountGuard;

pub mod locks;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error(transparent)]
    CommandErr(#[from] CommandError),
    #[error(transparent)]
    AccountErr(#[from] AccountError),
    #[error(transparent)]
    StoreErr(#[from] StoreError),
    #[error("Timed out waiting for access to account {account_number}")]
    LockTimeout { account_number: AccountNumber },
}

/// Flat classification of [`TransactionError`] for callers that map errors to
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccountClosed,
    AlreadyClosed,
    DuplicateIdentity,
    InvalidAmount,
    InvalidInput,
    InsufficientFunds,
    InvalidBalance,
    StorageFailure,
    LockTimeout,
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::CommandErr(err) => match err {
                CommandError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
                CommandError::MissingField { .. } | CommandError::InvalidField { .. } => {
                    ErrorKind::InvalidInput
                }
            },
            TransactionError::AccountErr(err) => match err {
                AccountError::AccountClosed { .. } => ErrorKind::AccountClosed,
                AccountError::AlreadyClosed { .. } => ErrorKind::AlreadyClosed,
                AccountError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
                AccountError::BalanceOverflow => ErrorKind::InvalidBalance,
            },
            TransactionError::StoreErr(err) => match err {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::AccountClosed { .. } => ErrorKind::AccountClosed,
                StoreError::AlreadyClosed { .. } => ErrorKind::AlreadyClosed,
                StoreError::DuplicateIdentity { .. } => ErrorKind::DuplicateIdentity,
                StoreError::InvalidBalance { .. } => ErrorKind::InvalidBalance,
                StoreError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
                StoreError::Storage(_) => ErrorKind::StorageFailure,
            },
            TransactionError::LockTimeout { .. } => ErrorKind::LockTimeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReceipt {
    pub transaction_id: TransactionId,
    pub new_balance: Decimal,
}

/// What happened to the opening deposit of a freshly created account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpeningDeposit {
    None,
    Recorded(TransactionId),
    /// The account exists with a zero balance, the deposit was not applied.
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedAccount {
    pub account_number: AccountNumber,
    pub opening_deposit: OpeningDeposit,
}

/// Runs every money movement as validate, mutate, record while holding the
/// account lock. A failed record step reverts the mutation before the lock is
/// released, so other operations only ever see committed state.
pub struct TransactionCoordinator<S, L> {
    storage: Arc<Storage<S, L>>,
}

impl<S, L> Clone for TransactionCoordinator<S, L> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S, L> TransactionCoordinator<S, L>
where
    S: AccountStore,
    L: Ledger,
{
    pub fn new(storage: Arc<Storage<S, L>>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage<S, L> {
        &self.storage
    }

    /// Accounts are never removed, so checking existence first keeps unknown
    /// numbers out of the lock table.
    fn lock(&self, account_number: AccountNumber) -> Result<AccountGuard, TransactionError> {
        self.storage.accounts().get(account_number)?;
        let locks = self.storage.locks();
        locks.acquire(account_number).ok_or_else(|| {
            warn!(
                account_number,
                timeout = ?locks.timeout(),
                "Gave up waiting for account lock"
            );
            TransactionError::LockTimeout { account_number }
        })
    }

    /// Restores the pre-operation balance and status after a failed record step.
    fn roll_back(&self, snapshot: &Account, cause: &StoreError) {
        let account_number = snapshot.account_number();
        if matches!(cause, StoreError::Storage(_)) {
            error!(account_number, %cause, "Ledger write failed, rolling back");
        } else {
            warn!(account_number, %cause, "Ledger rejected record, rolling back");
        }
        if let Err(err) = self.storage.accounts().revert_to(snapshot) {
            error!(
                account_number,
                %err,
                balance = %snapshot.balance(),
                "Rollback failed, manual reconciliation required"
            );
        }
    }

    pub fn deposit(
        &self,
        account_number: AccountNumber,
        amount: Decimal,
        description: &str,
    ) -> Result<MovementReceipt, TransactionError> {
        self.move_funds(account_number, TransactionKind::Deposit, amount, description)
    }

    pub fn withdraw(
        &self,
        account_number: AccountNumber,
        amount: Decimal,
        description: &str,
    ) -> Result<MovementReceipt, TransactionError> {
        self.move_funds(account_number, TransactionKind::Withdrawal, amount, description)
    }

    pub fn execute(&self, command: &MovementCommand) -> Result<MovementReceipt, TransactionError> {
        self.move_funds(
            command.account_number,
            command.kind,
            command.amount,
            &command.description,
        )
    }

    fn move_funds(
        &self,
        account_number: AccountNumber,
        kind: TransactionKind,
        amount: Decimal,
        description: &str,
    ) -> Result<MovementReceipt, TransactionError> {
        let amount = command::validate_amount(amount)?;
        let _guard = self.lock(account_number)?;

        let account = self.storage.accounts().get(account_number)?;
        // balance check and update happen under the same lock
        let change = account.handle_movement(kind, amount)?;
        self.storage
            .accounts()
            .set_balance(account_number, change.new_balance)?;

        match self
            .storage
            .ledger()
            .append(account_number, kind, amount, description)
        {
            Ok(transaction_id) => {
                debug!(
                    account_number,
                    ?kind,
                    %amount,
                    %transaction_id,
                    balance = %change.new_balance,
                    "Committed"
                );
                Ok(MovementReceipt {
                    transaction_id,
                    new_balance: change.new_balance,
                })
            }
            Err(err) => {
                self.roll_back(&account, &err);
                Err(err.into())
            }
        }
    }

    /// Freezes the account and records who closed it and why. Returns the
    /// final balance to hand over to the customer.
    pub fn close_account(
        &self,
        account_number: AccountNumber,
        reason: &str,
        handled_by: OperatorId,
    ) -> Result<Decimal, TransactionError> {
        let _guard = self.lock(account_number)?;

        let account = self.storage.accounts().get(account_number)?;
        let final_balance = account.handle_closure()?;
        self.storage.accounts().close(account_number)?;

        match self
            .storage
            .ledger()
            .record_closure(account_number, reason, final_balance, handled_by)
        {
            Ok(()) => {
                info!(account_number, %final_balance, %handled_by, "Account closed");
                Ok(final_balance)
            }
            Err(err) => {
                self.roll_back(&account, &err);
                Err(err.into())
            }
        }
    }

    /// Creates the account with a zero balance, then funds it through a regular
    /// deposit. The two steps are not atomic with each other: once created, the
    /// account is returned even if the deposit fails, and the outcome is
    /// reported in [`OpenedAccount::opening_deposit`].
    pub fn open_account_with_initial_deposit(
        &self,
        owner: Customer,
        account_type: AccountType,
        initial_deposit: Decimal,
    ) -> Result<OpenedAccount, TransactionError> {
        let initial_deposit = command::validate_opening_deposit(initial_deposit)?;
        let account_number = self
            .storage
            .accounts()
            .create(owner, account_type, Decimal::new(0, command::MONEY_SCALE))?;
        info!(account_number, ?account_type, "Account opened");

        let opening_deposit = if initial_deposit.is_zero() {
            OpeningDeposit::None
        } else {
            match self.deposit(account_number, initial_deposit, INITIAL_DEPOSIT_DESCRIPTION) {
                Ok(receipt) => OpeningDeposit::Recorded(receipt.transaction_id),
                Err(err) => {
                    error!(
                        account_number,
                        %initial_deposit,
                        %err,
                        "Account opened without its initial deposit"
                    );
                    OpeningDeposit::Failed(err.kind())
                }
            }
        };

        Ok(OpenedAccount {
            account_number,
            opening_deposit,
        })
    }
}
