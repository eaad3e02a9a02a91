use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::TxnId;

/// Lock modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    /// Whether a held lock of this mode already grants `requested`
    fn covers(self, requested: LockMode) -> bool {
        self == LockMode::Exclusive || requested == LockMode::Shared
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Deadlock detected: transaction {txn_id} waits for {blocking}")]
    Deadlock { txn_id: TxnId, blocking: TxnId },
}

/// A granted lock
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub txn_id: TxnId,
    pub resource: String,
    pub mode: LockMode,
    pub request_time: Instant,
    pub granted: bool,
}

#[derive(Default)]
struct LockTable {
    /// Granted requests per resource
    locks: HashMap<String, Vec<LockRequest>>,
    /// Each waiting transaction points at one holder it waits for
    waits_for: HashMap<TxnId, TxnId>,
}

impl LockTable {
    fn try_grant(&mut self, txn_id: TxnId, resource: &str, mode: LockMode) -> Result<(), TxnId> {
        let holders = self.locks.entry(resource.to_string()).or_default();

        let held = holders.iter().find(|r| r.txn_id == txn_id).map(|r| r.mode);
        if let Some(held) = held {
            if held.covers(mode) {
                return Ok(());
            }
            // Upgrade to Exclusive needs every other holder gone
            if let Some(other) = holders.iter().find(|r| r.txn_id != txn_id) {
                return Err(other.txn_id);
            }
            for own in holders.iter_mut() {
                own.mode = LockMode::Exclusive;
            }
            return Ok(());
        }

        let conflict = holders
            .iter()
            .find(|r| mode == LockMode::Exclusive || r.mode == LockMode::Exclusive);
        if let Some(holder) = conflict {
            return Err(holder.txn_id);
        }

        holders.push(LockRequest {
            txn_id,
            resource: resource.to_string(),
            mode,
            request_time: Instant::now(),
            granted: true,
        });
        Ok(())
    }

    /// Follow the wait-for chain from `start`; true if it comes back around
    fn has_cycle(&self, start: TxnId) -> bool {
        let mut visited = HashSet::new();
        let mut current = start;
        while let Some(&next) = self.waits_for.get(&current) {
            if !visited.insert(current) {
                return true;
            }
            current = next;
        }
        false
    }
}

/// Shared/exclusive lock table with wait-for deadlock detection.
///
/// Acquisition polls: each failed attempt sleeps for the retry interval
/// before trying again.
pub struct LockManager {
    table: Mutex<LockTable>,
    retry_interval: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl LockManager {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            retry_interval,
        }
    }

    /// Acquire a lock, waiting at most `timeout`.
    ///
    /// Returns `Ok(false)` when the deadline passes and `LockError::Deadlock`
    /// when waiting would close a cycle; the caller should abort then.
    pub fn acquire_lock(
        &self,
        txn_id: TxnId,
        resource: &str,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<bool, LockError> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut table = self.table.lock();
                match table.try_grant(txn_id, resource, mode) {
                    Ok(()) => {
                        table.waits_for.remove(&txn_id);
                        debug!("txn {} locked {} ({:?})", txn_id, resource, mode);
                        return Ok(true);
                    }
                    Err(blocking) => {
                        table.waits_for.insert(txn_id, blocking);
                        if table.has_cycle(txn_id) {
                            table.waits_for.remove(&txn_id);
                            warn!(
                                "Deadlock: txn {} waiting for txn {} on {}",
                                txn_id, blocking, resource
                            );
                            return Err(LockError::Deadlock { txn_id, blocking });
                        }
                    }
                }

                if Instant::now() >= deadline {
                    table.waits_for.remove(&txn_id);
                    debug!("txn {} timed out waiting for {}", txn_id, resource);
                    return Ok(false);
                }
            }

            thread::sleep(self.retry_interval);
        }
    }

    /// Release every lock held by a transaction and its wait-for edge
    pub fn release_all_locks(&self, txn_id: TxnId) {
        let mut table = self.table.lock();
        table.locks.retain(|_, holders| {
            holders.retain(|r| r.txn_id != txn_id);
            !holders.is_empty()
        });
        table.waits_for.remove(&txn_id);
    }

    /// Locks held by a transaction, sorted by resource
    pub fn held_locks(&self, txn_id: TxnId) -> Vec<(String, LockMode)> {
        let table = self.table.lock();
        let mut held: Vec<(String, LockMode)> = table
            .locks
            .values()
            .flatten()
            .filter(|r| r.txn_id == txn_id)
            .map(|r| (r.resource.clone(), r.mode))
            .collect();
        held.sort_by(|a, b| a.0.cmp(&b.0));
        held
    }

    pub fn holders(&self, resource: &str) -> Vec<(TxnId, LockMode)> {
        let table = self.table.lock();
        table
            .locks
            .get(resource)
            .map(|holders| holders.iter().map(|r| (r.txn_id, r.mode)).collect())
            .unwrap_or_default()
    }

    /// The holder a transaction is currently waiting for
    pub fn waits_for(&self, txn_id: TxnId) -> Option<TxnId> {
        self.table.lock().waits_for.get(&txn_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn test_shared_locks_are_compatible() {
        let lm = LockManager::default();
        assert_eq!(lm.acquire_lock(1, "r", LockMode::Shared, SHORT), Ok(true));
        assert_eq!(lm.acquire_lock(2, "r", LockMode::Shared, SHORT), Ok(true));
        assert_eq!(lm.holders("r").len(), 2);
    }

    #[test]
    fn test_exclusive_blocks_shared_until_timeout() {
        let lm = LockManager::default();
        assert_eq!(lm.acquire_lock(1, "r", LockMode::Exclusive, SHORT), Ok(true));

        let started = Instant::now();
        assert_eq!(lm.acquire_lock(2, "r", LockMode::Shared, SHORT), Ok(false));
        assert!(started.elapsed() >= SHORT);
        assert_eq!(lm.waits_for(2), None);
    }

    #[test]
    fn test_own_lock_is_reentrant_and_upgradable() {
        let lm = LockManager::default();
        assert_eq!(lm.acquire_lock(1, "r", LockMode::Exclusive, SHORT), Ok(true));
        assert_eq!(lm.acquire_lock(1, "r", LockMode::Shared, SHORT), Ok(true));
        assert_eq!(lm.held_locks(1), vec![("r".to_string(), LockMode::Exclusive)]);

        assert_eq!(lm.acquire_lock(2, "s", LockMode::Shared, SHORT), Ok(true));
        assert_eq!(lm.acquire_lock(2, "s", LockMode::Exclusive, SHORT), Ok(true));
        assert_eq!(lm.holders("s"), vec![(2, LockMode::Exclusive)]);
    }

    #[test]
    fn test_release_wakes_waiter() {
        let lm = Arc::new(LockManager::default());
        assert_eq!(lm.acquire_lock(1, "r", LockMode::Exclusive, SHORT), Ok(true));

        let waiter = {
            let lm = Arc::clone(&lm);
            thread::spawn(move || lm.acquire_lock(2, "r", LockMode::Exclusive, Duration::from_secs(5)))
        };
        thread::sleep(SHORT);
        lm.release_all_locks(1);

        assert_eq!(waiter.join().unwrap(), Ok(true));
        assert_eq!(lm.holders("r"), vec![(2, LockMode::Exclusive)]);
        assert!(lm.held_locks(1).is_empty());
    }

    #[test]
    fn test_two_transaction_cycle_is_deadlock() {
        let lm = Arc::new(LockManager::default());
        assert_eq!(lm.acquire_lock(1, "a", LockMode::Exclusive, SHORT), Ok(true));
        assert_eq!(lm.acquire_lock(2, "b", LockMode::Exclusive, SHORT), Ok(true));

        // txn 1 waits for b in the background
        let first = {
            let lm = Arc::clone(&lm);
            thread::spawn(move || lm.acquire_lock(1, "b", LockMode::Exclusive, Duration::from_secs(5)))
        };
        thread::sleep(SHORT);
        assert_eq!(lm.waits_for(1), Some(2));

        let second = lm.acquire_lock(2, "a", LockMode::Exclusive, Duration::from_secs(5));
        assert_eq!(second, Err(LockError::Deadlock { txn_id: 2, blocking: 1 }));

        lm.release_all_locks(2);
        assert_eq!(first.join().unwrap(), Ok(true));
    }
}
