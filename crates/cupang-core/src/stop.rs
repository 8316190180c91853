//! ---
//! cupang_section: "07-update-orchestration"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Cooperative cancellation shared across a run."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Run-wide cancellation flag. Cloning shares the flag.
///
/// Polled by the scanner, the downloader and the pool wait; sleepers parked in
/// [`StopFlag::sleep`] are woken as soon as it is set.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once the flag is set.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless stopped first. Returns `true` when the
    /// full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_set() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_set(),
            _ = self.wait() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_wakes_sleepers() {
        let flag = StopFlag::new();
        let sleeper = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.sleep(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        flag.stop();
        let completed = tokio::time::timeout(Duration::from_secs(2), sleeper)
            .await
            .unwrap()
            .unwrap();
        assert!(!completed);
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn short_sleep_completes() {
        let flag = StopFlag::new();
        assert!(flag.sleep(Duration::from_millis(5)).await);
    }
}
