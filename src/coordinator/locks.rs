use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::{Mutex, RawMutex, lock_api::ArcMutexGuard};

use crate::account::AccountNumber;

/// Lock table keyed by account number.
///
/// Waiting is bounded by the configured timeout and every release is a fair
/// unlock, handing the lock to the longest waiter instead of letting the
/// releasing thread barge back in.
pub struct AccountLocks {
    slots: Mutex<HashMap<AccountNumber, Arc<Mutex<()>>>>,
    timeout: Duration,
}

/// Exclusive access to one account, released on drop.
pub struct AccountGuard {
    account_number: AccountNumber,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl AccountGuard {
    pub fn account_number(&self) -> AccountNumber {
        self.account_number
    }
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            ArcMutexGuard::unlock_fair(guard);
        }
    }
}

impl AccountLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns `None` when the lock could not be taken within the timeout.
    pub fn acquire(&self, account_number: AccountNumber) -> Option<AccountGuard> {
        let slot = Arc::clone(self.slots.lock().entry(account_number).or_default());
        slot.try_lock_arc_for(self.timeout).map(|guard| AccountGuard {
            account_number,
            guard: Some(guard),
        })
    }
}
