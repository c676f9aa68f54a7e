//! Per-connection liveness pulse.
//!
//! Proxies and load balancers reclaim connections that stay idle for too
//! long. Every long-lived push connection therefore gets a
//! [`HeartbeatTimer`] that writes a no-op frame into its outbound queue on
//! a fixed interval, whether or not real traffic flows.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Interval between heartbeat frames.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// A running heartbeat task bound to one outbound queue.
///
/// The timer only holds a weak reference to the queue: once every other
/// sender is gone (the connection was removed from its set) the next beat
/// counts as a failed write. The task stops on its own after the first
/// failed write, calling the `on_failure` hook exactly once.
/// [`cancel`](HeartbeatTimer::cancel) (or dropping the timer) aborts it;
/// an aborted timer never writes again.
#[derive(Debug)]
pub struct HeartbeatTimer {
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatTimer {
    /// Start beating. The first beat is written one `interval` from now.
    pub fn start<T, F>(interval: Duration, sender: &mpsc::Sender<T>, beat: T, on_failure: F) -> Self
    where
        T: Clone + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let sender = sender.downgrade();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let written = match sender.upgrade() {
                    Some(sender) => sender.try_send(beat.clone()).is_ok(),
                    None => false,
                };
                if !written {
                    debug!("Heartbeat write failed, stopping timer");
                    on_failure();
                    return;
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether the timer is still scheduled to beat.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for HeartbeatTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    const INTERVAL: Duration = Duration::from_secs(25);

    #[tokio::test(start_paused = true)]
    async fn test_beats_on_interval() {
        let (tx, mut rx) = mpsc::channel(8);
        let _timer = HeartbeatTimer::start(INTERVAL, &tx, (), || {});
        let started = Instant::now();

        rx.recv().await.unwrap();
        assert_eq!(started.elapsed().as_secs(), 25);

        rx.recv().await.unwrap();
        assert_eq!(started.elapsed().as_secs(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_beat_after_cancel() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timer = HeartbeatTimer::start(INTERVAL, &tx, (), || {});

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_ok());

        timer.cancel();
        assert!(!timer.is_running());
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_beat_after_drop() {
        let (tx, mut rx) = mpsc::channel(8);
        let timer = HeartbeatTimer::start(INTERVAL, &tx, (), || {});
        drop(timer);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_stops_timer_and_reports_once() {
        let (tx, rx) = mpsc::channel::<()>(8);
        let (failed_tx, failed_rx) = oneshot::channel();
        let timer = HeartbeatTimer::start(INTERVAL, &tx, (), move || {
            let _ = failed_tx.send(());
        });
        drop(rx);

        failed_rx.await.unwrap();
        tokio::task::yield_now().await;
        assert!(!timer.is_running());
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_once_queue_owner_releases_it() {
        let (tx, mut rx) = mpsc::channel::<()>(8);
        let (failed_tx, failed_rx) = oneshot::channel();
        let timer = HeartbeatTimer::start(INTERVAL, &tx, (), move || {
            let _ = failed_tx.send(());
        });
        drop(tx);

        failed_rx.await.unwrap();
        tokio::task::yield_now().await;
        assert!(!timer.is_running());
        // Only the weak reference was left, so the queue closed.
        assert!(rx.recv().await.is_none());
    }
}
