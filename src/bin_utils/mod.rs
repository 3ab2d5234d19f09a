//! Bootstraps [`bank_ledger`](crate) for headless use: replays a CSV file of
//! operations against a fresh engine and prints the resulting accounts.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    command::{self, CommandError, MovementCommand},
    config::EngineConfig,
    coordinator::{OpeningDeposit, TransactionCoordinator, TransactionError},
    lifecycle::AccountLifecycleManager,
    record::{OperatorId, TransactionKind},
    store::{AccountStore, InMemoryAccountStore, InMemoryLedger, JournaledLedger, Ledger, Storage},
};
use csv_parser::{CsvOperationParser, Operation, OperationKind};
use csv_printer::{AccountRow, print_accounts};
pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Malformed row: {0}")]
    ParseErr(#[from] csv::Error),
    #[error(transparent)]
    TransactionErr(#[from] TransactionError),
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: EngineConfig,
    pub error_printer: Box<dyn FnMut(u64, ServiceError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(self) -> Result<()> {
        match self.config.journal_path.clone() {
            Some(path) => {
                let ledger = JournaledLedger::create(&path)
                    .with_context(|| format!("Failed to open journal `{}`", path.display()))?;
                // accounts are not journaled, keep new numbers clear of recorded ones
                let accounts = match ledger.last_account_number() {
                    Some(last) => InMemoryAccountStore::numbered_after(last),
                    None => InMemoryAccountStore::default(),
                };
                info!(journal = %ledger.path().display(), "Journaling ledger records");
                self.process(accounts, ledger)
            }
            None => self.process(InMemoryAccountStore::default(), InMemoryLedger::default()),
        }
    }

    fn process<L: Ledger>(mut self, accounts: InMemoryAccountStore, ledger: L) -> Result<()> {
        let storage = Storage::new(accounts, ledger, self.config.lock_timeout());
        let manager =
            AccountLifecycleManager::new(TransactionCoordinator::new(storage), &self.config);

        let parser = CsvOperationParser::new(self.input).context("Failed to read CSV header")?;
        for (line, row) in parser {
            let outcome = row
                .map_err(ServiceError::from)
                .and_then(|op| apply(&manager, &op).map_err(ServiceError::from));
            if let Err(err) = outcome {
                (self.error_printer)(line, err);
            }
        }

        let accounts = manager.coordinator().storage().accounts().list();
        print_accounts(
            self.output,
            accounts.into_iter().map(|acc| AccountRow {
                account: acc.account_number(),
                owner: acc.owner().full_name(),
                account_type: acc.account_type(),
                status: acc.status(),
                balance: acc.balance(),
            }),
        )
    }
}

fn required_column<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, CommandError> {
    value
        .as_deref()
        .ok_or(CommandError::MissingField { field })
}

fn apply<S, L>(
    manager: &AccountLifecycleManager<S, L>,
    op: &Operation,
) -> Result<(), TransactionError>
where
    S: AccountStore,
    L: Ledger,
{
    match op.kind {
        OperationKind::Open => {
            let opened = manager.create_customer_account(op.open_form())?;
            if let OpeningDeposit::Failed(kind) = opened.opening_deposit {
                warn!(
                    account_number = opened.account_number,
                    ?kind,
                    "Opened without initial deposit"
                );
            }
        }
        OperationKind::Deposit | OperationKind::Withdraw => {
            let kind = if op.kind == OperationKind::Deposit {
                TransactionKind::Deposit
            } else {
                TransactionKind::Withdrawal
            };
            let movement = MovementCommand::parse(
                required_column(&op.account, "account number")?,
                kind,
                op.amount.as_deref().unwrap_or_default(),
                op.text.as_deref(),
            )?;
            manager.coordinator().execute(&movement)?;
        }
        OperationKind::Close => {
            let account_number =
                command::parse_account_number(required_column(&op.account, "account number")?)?;
            let operator = op
                .operator
                .map(OperatorId::new)
                .ok_or(CommandError::MissingField { field: "operator" })?;
            manager.close_customer_account(
                account_number,
                op.text.as_deref().unwrap_or_default(),
                operator,
            )?;
        }
    }
    Ok(())
}
