//! Watcher bookkeeping shared by the local store backends.

use super::{ChangeCallback, Snapshot, StorageError, StorageResult, Subscription, WatchTarget};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

type Callback = Arc<dyn Fn(Snapshot) + Send + Sync>;

struct Watcher {
    id: u64,
    target: WatchTarget,
    callback: Callback,
}

#[derive(Default)]
pub(crate) struct WatchRegistry {
    next_id: AtomicU64,
    watchers: RwLock<Vec<Watcher>>,
}

impl WatchRegistry {
    /// Register a watcher and hand back a subscription that removes it.
    pub(crate) fn register(
        self: &Arc<Self>,
        target: WatchTarget,
        callback: ChangeCallback,
    ) -> StorageResult<(Subscription, Callback)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback = Arc::from(callback);
        self.watchers
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?
            .push(Watcher {
                id,
                target,
                callback: callback.clone(),
            });

        let registry = Arc::downgrade(self);
        let subscription = Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        });
        Ok((subscription, callback))
    }

    fn remove(&self, id: u64) {
        if let Ok(mut watchers) = self.watchers.write() {
            watchers.retain(|w| w.id != id);
        }
    }

    /// Watchers whose view changes when `doc_path` is written.
    pub(crate) fn interested(&self, doc_path: &str) -> Vec<(WatchTarget, Callback)> {
        match self.watchers.read() {
            Ok(watchers) => watchers
                .iter()
                .filter(|w| w.target.is_affected_by(doc_path))
                .map(|w| (w.target.clone(), w.callback.clone()))
                .collect(),
            Err(e) => {
                log::error!("Watcher registry poisoned: {}", e);
                Vec::new()
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.watchers.read().map(|w| w.len()).unwrap_or(0)
    }
}
