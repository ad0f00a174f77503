//! # Client Lock Registry Module
//!
//! Per-client mutual exclusion for cart mutations. Two near-simultaneous
//! button presses from the same client would otherwise both observe "no
//! line yet" and insert duplicate rows; holding the client's lock across the
//! read-modify-write makes them run one after the other while different
//! clients proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per client id
///
/// Locks are created on first request and kept for the process lifetime;
/// their count is bounded by the number of distinct clients.
#[derive(Debug, Default)]
pub struct ClientLocks {
    locks: Mutex<HashMap<i32, Arc<AsyncMutex<()>>>>,
}

impl ClientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `client_id`'s cart
    pub async fn acquire(&self, client_id: i32) -> OwnedMutexGuard<()> {
        self.lock_for(client_id).lock_owned().await
    }

    /// Get or create the mutex for a client
    fn lock_for(&self, client_id: i32) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            locks
                .entry(client_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Number of clients that have ever taken a lock
    pub fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
