use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info};

use super::ports::RefreshTimer;
use super::updater::CrlUpdater;

/// Used when a deadline is too far away to be represented.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Longest sleep before a wall-clock deadline is compared with the clock again.
const WALL_CLOCK_RECHECK: Duration = Duration::from_secs(60);

/// Pending deadline of a [`WatchTimer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// A point in wall-clock time. Waiting for it follows clock adjustments
    /// and time spent suspended.
    At(DateTime<Utc>),
    /// A point on the monotonic clock
    After(Instant),
}

/// Timer backed by a watch channel. The receiving side is driven by
/// [`spawn_refresh_loop`].
pub struct WatchTimer {
    tx: watch::Sender<Option<Deadline>>,
}

impl WatchTimer {
    pub fn new() -> (Self, watch::Receiver<Option<Deadline>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Makes the refresh loop run an update right away.
    pub fn fire_now(&self) {
        self.arm(Duration::ZERO);
    }

    /// Pending deadline, if any
    pub fn deadline(&self) -> Option<Deadline> {
        *self.tx.borrow()
    }

    fn arm(&self, delay: Duration) {
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.tx.send_replace(Some(Deadline::After(deadline)));
    }
}

impl RefreshTimer for WatchTimer {
    fn schedule_at(&self, at: DateTime<Utc>) {
        self.tx.send_replace(Some(Deadline::At(at)));
    }

    fn schedule_after(&self, after: Duration) {
        self.arm(after);
    }
}

/// Time left until `at`, zero once it has passed.
fn wall_clock_delay(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

async fn wait_until(deadline: Option<Deadline>) {
    match deadline {
        Some(Deadline::After(deadline)) => sleep_until(deadline).await,
        Some(Deadline::At(at)) => loop {
            let delay = wall_clock_delay(at, Utc::now());
            if delay.is_zero() {
                break;
            }
            sleep(delay.min(WALL_CLOCK_RECHECK)).await;
        },
        None => std::future::pending().await,
    }
}

/// Runs an update cycle each time the timer fires.
///
/// A cycle that does not re-arm the timer (failure or cancellation) is
/// retried after `retry_interval`. The loop ends when the updater is dropped.
pub fn spawn_refresh_loop(
    updater: Weak<CrlUpdater>,
    mut deadlines: watch::Receiver<Option<Deadline>>,
    retry_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut deadline = *deadlines.borrow_and_update();
        loop {
            tokio::select! {
                changed = deadlines.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    deadline = *deadlines.borrow_and_update();
                }
                _ = wait_until(deadline) => {
                    let Some(updater) = updater.upgrade() else {
                        break;
                    };

                    debug!("Running scheduled CRL update");
                    match updater.run_update_cycle().await {
                        Ok(url) => info!("Scheduled CRL update installed CRL from {}", url),
                        Err(e) => error!("Scheduled CRL update failed: {}", e),
                    }
                    drop(updater);

                    deadline = if deadlines.has_changed().unwrap_or(false) {
                        *deadlines.borrow_and_update()
                    } else {
                        debug!("Retrying CRL update in {:?}", retry_interval);
                        Some(Deadline::After(Instant::now() + retry_interval))
                    };
                }
            }
        }
        debug!("CRL refresh loop stopped");
    })
}
