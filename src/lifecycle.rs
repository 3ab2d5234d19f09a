use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::{
    account::{Account, AccountNumber, AccountType, ContactUpdate},
    command::{self, OpenAccountForm},
    config::EngineConfig,
    coordinator::{OpenedAccount, TransactionCoordinator, TransactionError},
    record::{OperatorId, TransactionRecord},
    store::{AccountStore, Ledger, TransactionHistory},
};

/// Balance enquiry result for an Active account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub account_number: AccountNumber,
    pub owner_name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub account: Account,
    pub history: TransactionHistory,
}

/// A ledger record joined with its owner's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub owner_name: String,
    pub record: TransactionRecord,
}

pub struct AccountLifecycleManager<S, L> {
    coordinator: TransactionCoordinator<S, L>,
    recent_activity_limit: usize,
}

impl<S, L> AccountLifecycleManager<S, L>
where
    S: AccountStore,
    L: Ledger,
{
    pub fn new(coordinator: TransactionCoordinator<S, L>, config: &EngineConfig) -> Self {
        Self {
            coordinator,
            recent_activity_limit: config.recent_activity_limit,
        }
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<S, L> {
        &self.coordinator
    }

    fn accounts(&self) -> &S {
        self.coordinator.storage().accounts()
    }

    fn ledger(&self) -> &L {
        self.coordinator.storage().ledger()
    }

    pub fn create_customer_account(
        &self,
        form: OpenAccountForm,
    ) -> Result<OpenedAccount, TransactionError> {
        let command = form.parse()?;
        self.coordinator.open_account_with_initial_deposit(
            command.owner,
            command.account_type,
            command.initial_deposit,
        )
    }

    /// Closes the account and returns the balance to hand over to the customer.
    pub fn close_customer_account(
        &self,
        account_number: AccountNumber,
        reason: &str,
        operator: OperatorId,
    ) -> Result<Decimal, TransactionError> {
        let reason = command::required(reason, "closure reason")?;
        self.coordinator.close_account(account_number, &reason, operator)
    }

    pub fn update_contact(
        &self,
        account_number: AccountNumber,
        update: ContactUpdate,
    ) -> Result<(), TransactionError> {
        command::required(update.value(), update.field_name())?;
        let field = update.field_name();
        self.accounts().patch_contact_field(account_number, update)?;
        info!(account_number, field, "Contact details updated");
        Ok(())
    }

    /// Looks up an Active account, closed accounts present as not found.
    pub fn find_active(&self, account_number: AccountNumber) -> Result<Account, TransactionError> {
        Ok(self.accounts().get_active(account_number)?)
    }

    pub fn balance_enquiry(
        &self,
        account_number: AccountNumber,
    ) -> Result<AccountSummary, TransactionError> {
        let account = self.find_active(account_number)?;
        let transaction_count = self.ledger().list_by_account(account_number).len();
        Ok(AccountSummary {
            account_number,
            owner_name: account.owner().full_name(),
            account_type: account.account_type(),
            balance: account.balance(),
            transaction_count,
        })
    }

    /// Full history of any account that ever existed, open or closed.
    pub fn statement(&self, account_number: AccountNumber) -> Result<Statement, TransactionError> {
        let account = self.accounts().get(account_number)?;
        let history = self.ledger().list_by_account(account_number);
        Ok(Statement { account, history })
    }

    pub fn active_account_count(&self) -> usize {
        self.accounts().active_count()
    }

    /// Newest ledger records across all accounts, with owner names resolved.
    pub fn recent_activity(&self) -> Vec<ActivityEntry> {
        self.ledger()
            .list_all()
            .iter()
            .take(self.recent_activity_limit)
            .filter_map(|record| match self.accounts().get(record.account_number()) {
                Ok(account) => Some(ActivityEntry {
                    owner_name: account.owner().full_name(),
                    record: record.clone(),
                }),
                Err(err) => {
                    debug!(%err, transaction_id = %record.transaction_id(), "Skipping orphan record");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        command::tests::form,
        coordinator::{ErrorKind, OpeningDeposit},
        record::TransactionKind,
        store::{InMemoryAccountStore, InMemoryLedger, Storage},
    };

    use super::*;

    fn manager() -> AccountLifecycleManager<InMemoryAccountStore, InMemoryLedger> {
        let config = EngineConfig {
            recent_activity_limit: 3,
            ..Default::default()
        };
        let storage = Storage::in_memory(&config);
        AccountLifecycleManager::new(TransactionCoordinator::new(storage), &config)
    }

    #[test]
    fn create_from_form() {
        let manager = manager();
        let opened = manager
            .create_customer_account(form("111122223333", "ABCDE1234F", "500.00"))
            .unwrap();
        assert!(matches!(opened.opening_deposit, OpeningDeposit::Recorded(_)));

        let summary = manager.balance_enquiry(opened.account_number).unwrap();
        assert_eq!(summary.owner_name, "Asha Rao");
        assert_eq!(summary.balance, dec!(500.00));
        assert_eq!(summary.transaction_count, 1);
        assert_eq!(manager.active_account_count(), 1);
    }

    #[test]
    fn invalid_form_touches_nothing() {
        let manager = manager();
        let mut bad = form("1", "P", "10");
        bad.mobile = String::new();
        let err = manager.create_customer_account(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(manager.active_account_count(), 0);
    }

    #[test]
    fn close_requires_reason_and_reports_final_balance() {
        let manager = manager();
        let number = manager
            .create_customer_account(form("1", "P", "250.00"))
            .unwrap()
            .account_number;
        let operator = OperatorId::new(4);

        let err = manager
            .close_customer_account(number, "   ", operator)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let final_balance = manager
            .close_customer_account(number, "customer request", operator)
            .unwrap();
        assert_eq!(final_balance, dec!(250.00));

        let err = manager
            .close_customer_account(number, "customer request", operator)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyClosed);

        // closed accounts are hidden from enquiries but keep their statement
        assert_eq!(
            manager.balance_enquiry(number).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        let statement = manager.statement(number).unwrap();
        assert!(!statement.account.is_active());
        assert_eq!(statement.history.len(), 1);
        assert_eq!(manager.active_account_count(), 0);
    }

    #[test]
    fn contact_updates() {
        let manager = manager();
        let number = manager
            .create_customer_account(form("1", "P", "0"))
            .unwrap()
            .account_number;

        manager
            .update_contact(number, ContactUpdate::Mobile("9000000001".into()))
            .unwrap();
        assert_eq!(
            manager.find_active(number).unwrap().owner().contact.mobile,
            "9000000001"
        );

        let err = manager
            .update_contact(number, ContactUpdate::PostalCode(" ".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = manager
            .update_contact(77, ContactUpdate::City("Pune".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        manager
            .close_customer_account(number, "moved", OperatorId::new(1))
            .unwrap();
        let err = manager
            .update_contact(number, ContactUpdate::City("Pune".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccountClosed);
    }

    #[test]
    fn recent_activity_is_limited_and_named() {
        let manager = manager();
        let first = manager
            .create_customer_account(form("1", "P", "100.00"))
            .unwrap()
            .account_number;
        let mut other = form("2", "Q", "0");
        other.first_name = "Ravi".to_string();
        other.last_name = "Kumar".to_string();
        let second = manager.create_customer_account(other).unwrap().account_number;

        let coordinator = manager.coordinator();
        coordinator.deposit(second, dec!(40.00), "cash").unwrap();
        coordinator.withdraw(first, dec!(10.00), "atm").unwrap();
        coordinator.deposit(first, dec!(5.00), "cash").unwrap();

        let activity = manager.recent_activity();
        assert_eq!(activity.len(), 3);
        assert_eq!(activity[0].record.amount(), dec!(5.00));
        assert_eq!(activity[1].record.kind(), TransactionKind::Withdrawal);
        assert_eq!(activity[2].owner_name, "Ravi Kumar");
    }
}
