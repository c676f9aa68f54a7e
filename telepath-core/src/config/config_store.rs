//! Hot-swappable config value with change notification.
//!
//! Only settings that can change without rebuilding actors live in a
//! `ConfigStore` (currently the notification sink's credentials). The
//! channel and session sets are fixed for the process lifetime.

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, watch};

/// A shared, versioned configuration value.
///
/// Every [`update`](ConfigStore::update) bumps the version published on
/// an internal watch channel, so [`ConfigWatcher`]s can `await` the next
/// change instead of polling.
pub struct ConfigStore<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    data: RwLock<T>,
    version_tx: watch::Sender<u64>,
}

/// Receives notifications when a [`ConfigStore`] is updated.
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(initial),
                version_tx,
            }),
        }
    }

    /// Replace the stored value and notify all watchers.
    pub async fn update(&self, value: T) {
        {
            let mut guard = self.inner.data.write().await;
            *guard = value;
        }
        // The write guard is gone by now, so woken watchers can read at once.
        self.inner.version_tx.send_modify(|v| *v += 1);
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.data.read().await
    }

    /// Number of updates applied since creation.
    pub fn version(&self) -> u64 {
        *self.inner.version_tx.borrow()
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Clone the current value out so no lock is held across awaits.
    pub async fn snapshot(&self) -> T {
        self.inner.data.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait until the store is updated.
    ///
    /// Returns `Err` once every [`ConfigStore`] clone has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}
