//! Concurrent access to the engine from many operator sessions.

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use bank_ledger::{
    account::AccountNumber,
    command::OpenAccountForm,
    config::EngineConfig,
    coordinator::{ErrorKind, TransactionCoordinator},
    lifecycle::AccountLifecycleManager,
    record::{OperatorId, TransactionKind},
    store::{AccountStore, InMemoryAccountStore, InMemoryLedger, Ledger, Storage},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

type Manager = AccountLifecycleManager<InMemoryAccountStore, InMemoryLedger>;

fn manager() -> Manager {
    let config = EngineConfig::default();
    AccountLifecycleManager::new(
        TransactionCoordinator::new(Storage::in_memory(&config)),
        &config,
    )
}

fn sample_form(id: u32, initial_deposit: &str) -> OpenAccountForm {
    OpenAccountForm {
        first_name: "Kiran".to_string(),
        last_name: format!("Customer{id}"),
        date_of_birth: "1988-09-30".to_string(),
        national_id: format!("4000 0000 {id:04}"),
        pan: format!("KIRAN{id:04}K"),
        account_type: "Savings".to_string(),
        initial_deposit: initial_deposit.to_string(),
        mobile: "9000000000".to_string(),
        address: "4 Park Street".to_string(),
        city: "Kolkata".to_string(),
        state: "West Bengal".to_string(),
        postal_code: "700016".to_string(),
        ..OpenAccountForm::default()
    }
}

fn open(manager: &Manager, id: u32, initial_deposit: &str) -> AccountNumber {
    manager
        .create_customer_account(sample_form(id, initial_deposit))
        .unwrap()
        .account_number
}

/// Zero plus every recorded delta, oldest first.
fn replay(manager: &Manager, account_number: AccountNumber) -> Decimal {
    manager
        .coordinator()
        .storage()
        .ledger()
        .list_by_account(account_number)
        .iter()
        .rev()
        .map(|record| record.signed_amount())
        .sum()
}

#[test]
fn concurrent_withdrawals_never_overdraw() {
    const THREADS: usize = 16;
    let manager = Arc::new(manager());
    let account = open(&manager, 1, "1050.00");

    let barrier = Arc::new(Barrier::new(THREADS));
    let succeeded = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            let succeeded = Arc::clone(&succeeded);
            thread::spawn(move || {
                barrier.wait();
                match manager
                    .coordinator()
                    .withdraw(account, dec!(100.00), "race")
                {
                    Ok(_) => {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => assert_eq!(err.kind(), ErrorKind::InsufficientFunds),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // floor(1050 / 100)
    assert_eq!(succeeded.load(Ordering::SeqCst), 10);
    let balance = manager.find_active(account).unwrap().balance();
    assert_eq!(balance, dec!(50.00));
    assert_eq!(replay(&manager, account), balance);
}

#[test]
fn mixed_traffic_keeps_ledger_and_balance_in_step() {
    const THREADS: u32 = 8;
    const ROUNDS: u32 = 40;
    let manager = Arc::new(manager());
    let accounts: Vec<AccountNumber> = (0..3)
        .map(|id| open(&manager, id, "20.00"))
        .collect();

    let barrier = Arc::new(Barrier::new(THREADS as usize));
    let handles: Vec<_> = (0..THREADS)
        .map(|thread_id| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            let accounts = accounts.clone();
            thread::spawn(move || {
                barrier.wait();
                let coordinator = manager.coordinator();
                for round in 0..ROUNDS {
                    let account = accounts[((thread_id + round) % 3) as usize];
                    let amount = Decimal::new(i64::from(round % 7 + 1) * 125, 2);
                    let result = if (thread_id + round) % 2 == 0 {
                        coordinator.deposit(account, amount, "load")
                    } else {
                        coordinator.withdraw(account, amount, "load")
                    };
                    if let Err(err) = result {
                        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
                    }
                    // readers never see a negative balance
                    let seen = manager.find_active(account).unwrap().balance();
                    assert!(seen >= Decimal::ZERO);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for account in accounts {
        let balance = manager.find_active(account).unwrap().balance();
        assert!(balance >= Decimal::ZERO);
        assert_eq!(replay(&manager, account), balance);
    }
}

#[test]
fn concurrent_closures_close_once() {
    const THREADS: usize = 8;
    let manager = Arc::new(manager());
    let account = open(&manager, 1, "250.00");

    let barrier = Arc::new(Barrier::new(THREADS));
    let closed = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..THREADS)
        .map(|operator| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            let closed = Arc::clone(&closed);
            thread::spawn(move || {
                barrier.wait();
                match manager.close_customer_account(
                    account,
                    "customer request",
                    OperatorId::new(operator as u32),
                ) {
                    Ok(final_balance) => {
                        assert_eq!(final_balance, dec!(250.00));
                        closed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => assert_eq!(err.kind(), ErrorKind::AlreadyClosed),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(closed.load(Ordering::SeqCst), 1);
    let storage = manager.coordinator().storage();
    let closure = storage.ledger().closure(account).unwrap();
    let frozen = storage.accounts().get(account).unwrap();
    assert_eq!(closure.final_balance(), frozen.balance());
}

#[test]
fn deposits_racing_closure_are_all_or_nothing() {
    const THREADS: usize = 6;
    let manager = Arc::new(manager());
    let account = open(&manager, 1, "10.00");

    let barrier = Arc::new(Barrier::new(THREADS + 1));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..20 {
                    if let Err(err) = manager.coordinator().deposit(account, dec!(1.00), "late") {
                        assert_eq!(err.kind(), ErrorKind::AccountClosed);
                    }
                }
            })
        })
        .collect();
    barrier.wait();
    let final_balance = manager
        .close_customer_account(account, "customer request", OperatorId::new(1))
        .unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    let storage = manager.coordinator().storage();
    let frozen = storage.accounts().get(account).unwrap();
    assert_eq!(frozen.balance(), final_balance);
    assert_eq!(replay(&manager, account), final_balance);
}

#[test]
fn repeated_reads_are_identical() {
    let manager = manager();
    let account = open(&manager, 1, "30.00");
    let coordinator = manager.coordinator();
    coordinator.withdraw(account, dec!(5.00), "atm").unwrap();
    coordinator.deposit(account, dec!(2.50), "cash").unwrap();

    let ledger = coordinator.storage().ledger();
    let first = ledger.list_by_account(account);
    let second = ledger.list_by_account(account);
    assert_eq!(first, second);
    assert!(first.iter().eq(second.iter()));
    let kinds: Vec<_> = first.iter().map(|record| record.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Deposit,
            TransactionKind::Withdrawal,
            TransactionKind::Deposit
        ]
    );
}
