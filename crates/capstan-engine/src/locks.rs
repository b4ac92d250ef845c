//! Per-app mutual exclusion

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Guard held while an app's record is being changed
pub type AppGuard = OwnedMutexGuard<()>;

/// One async mutex per app name. Different apps never contend.
#[derive(Default)]
pub struct AppLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `app_name`
    pub async fn lock(&self, app_name: &str) -> AppGuard {
        let lock = self
            .locks
            .lock()
            .entry(app_name.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Forget the lock of a deleted app, unless someone still holds or waits on it
    pub fn prune(&self, app_name: &str) {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(app_name) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(app_name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
