//! Per-machine-name mutual exclusion.
//!
//! Create and Delete check the state store and then act on it. Holding the
//! name's lock across both steps makes concurrent calls for the same name
//! run one at a time, while different names never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

struct Entry {
    lock: Arc<tokio::sync::Mutex<()>>,
    /// Holders plus waiters.
    users: usize,
}

type LockMap = HashMap<String, Entry>;

/// A set of async locks keyed by machine name.
///
/// Entries are created on demand and removed when the last holder or
/// waiter goes away, including waiters dropped before acquiring, so the map
/// only holds names currently in use.
#[derive(Clone, Default)]
pub struct NameLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    pub async fn lock(&self, name: &str) -> NameGuard {
        let (lock, user) = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let entry = map.entry(name.to_string()).or_insert_with(|| Entry {
                lock: Arc::default(),
                users: 0,
            });
            entry.users += 1;
            let user = User {
                name: name.to_string(),
                locks: self.inner.clone(),
            };
            (entry.lock.clone(), user)
        };
        // Dropping this future while pending drops `user`, which releases
        // the entry.
        let guard = lock.lock_owned().await;
        NameGuard { _guard: guard, _user: user }
    }

    /// Number of names currently locked or waited on.
    pub fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// One registered holder or waiter of a name.
struct User {
    name: String,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for User {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = map.get_mut(&self.name) else {
            return;
        };
        entry.users = entry.users.saturating_sub(1);
        if entry.users == 0 {
            map.remove(&self.name);
        }
    }
}

/// Exclusive access to one machine name, released on drop.
pub struct NameGuard {
    // Field order matters: the mutex is unlocked before the user leaves.
    _guard: OwnedMutexGuard<()>,
    _user: User,
}
