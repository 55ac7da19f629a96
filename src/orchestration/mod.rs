//! # Orchestration
//!
//! The three cooperating worker pipelines (Launcher, Recaller, Recycler),
//! the pool façade that feeds them, and the system wiring that constructs
//! limiters, queues, and worker pools once at service start.

pub mod facade;
pub mod launcher;
pub mod recaller;
pub mod recycler;
pub mod system;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub use facade::{DetailPage, PoolFacade};
pub use launcher::Launcher;
pub use recaller::Recaller;
pub use recycler::Recycler;
pub use system::{Adapters, PoolSystem};

/// Cooperative shutdown signal shared by every worker loop. Workers exit
/// between dispatches; in-flight external calls are not interrupted.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub async fn notified(&self) {
        if self.is_triggered() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_releases_waiters() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.notified().await });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        shutdown.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_triggered());
    }
}
