//! Periodic refresh of server data.
//!
//! Order tracking views re-fetch on a timer. [`spawn_poller`] runs the fetch
//! in a tokio task and publishes every successful result on a `watch`
//! channel; the view reads the latest value whenever it redraws. Dropping or
//! stopping the [`PollHandle`] cancels the task, including a fetch that is
//! in flight.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

/// Handle to a running poller.
pub struct PollHandle<T> {
    latest: watch::Receiver<Option<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> PollHandle<T> {
    /// The most recent successful result, if any poll has succeeded yet.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.latest.borrow().clone()
    }

    /// Wait for the next successful result.
    ///
    /// Returns `None` once the poller has stopped.
    pub async fn changed(&mut self) -> Option<T> {
        self.latest.changed().await.ok()?;
        self.latest.borrow_and_update().clone()
    }
}

impl<T> PollHandle<T> {
    /// A receiver that sees every published result.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.latest.clone()
    }

    /// Cancel the poller.
    pub fn stop(self) {
        drop(self);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `fetch` every `period`, starting immediately.
///
/// Failed polls are logged and skipped; the previous value stays visible.
/// Polls do not overlap: a slow fetch delays the next one.
pub fn spawn_poller<T, E, F, Fut>(period: Duration, mut fetch: F) -> PollHandle<T>
where
    T: Send + Sync + 'static,
    E: Display + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let (sender, latest) = watch::channel(None);
    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match fetch().await {
                Ok(value) => {
                    sender.send_replace(Some(value));
                    debug!("Poll succeeded");
                }
                Err(e) => warn!(error = %e, "Poll failed, keeping previous result"),
            }
            if sender.is_closed() {
                break;
            }
        }
    });
    PollHandle { latest, task }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_publishes_results_and_skips_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut handle = spawn_poller(Duration::from_millis(5), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n % 2 == 0 {
                    Err(format!("poll {n} failed"))
                } else {
                    Ok(n)
                }
            }
        });

        let first = handle.changed().await.unwrap();
        assert_eq!(first % 2, 1);
        let second = handle.changed().await.unwrap();
        assert_eq!(second % 2, 1);
        assert!(second > first);
        assert!(handle.latest().unwrap() >= second);
    }

    #[tokio::test]
    async fn test_stop_cancels_task() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut handle = spawn_poller(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(()) }
        });
        handle.changed().await.unwrap();
        handle.stop();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }
}
