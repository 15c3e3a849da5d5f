//! Snapshot store and fixed-interval refresher for the email feed.
//!
//! Every tick starts a new ingestion cycle and cancels the one before it, so
//! a slow fetch can never land on top of a newer one. A cycle only commits if
//! it is still the most recently started one when it finishes.
//!
//! Failure never clears data: the previous sequence stays served and the
//! error is recorded next to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::client::EmailSource;
use super::model::Email;
use crate::error::FeedError;

/// What the dashboard currently serves.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub emails: Arc<Vec<Email>>,
    /// When the served sequence was fetched. `None` until the first success.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Message of the latest failed cycle, cleared by the next success.
    pub last_error: Option<String>,
    /// Cycle that last wrote this snapshot.
    pub cycle: u64,
}

/// Handle for one in-flight ingestion cycle.
#[derive(Debug)]
pub struct RefreshCycle {
    pub id: u64,
    pub token: CancellationToken,
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The sequence was replaced wholesale.
    Replaced { count: usize },
    /// The fetch failed; the previous sequence is still served.
    Failed(FeedError),
    /// A newer cycle started first; nothing was written.
    Superseded,
}

/// Owned, injectable holder of the current feed snapshot.
pub struct EmailStore {
    snapshot: RwLock<FeedSnapshot>,
    latest_cycle: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl EmailStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            snapshot: RwLock::new(FeedSnapshot::default()),
            latest_cycle: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        })
    }

    /// Clone of the current snapshot. The email vector itself is shared.
    pub async fn snapshot(&self) -> FeedSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn emails(&self) -> Arc<Vec<Email>> {
        Arc::clone(&self.snapshot.read().await.emails)
    }

    /// Start a new cycle, cancelling whichever one is still running.
    ///
    /// The id is taken under the `in_flight` lock so the highest id always
    /// belongs to the token left uncancelled.
    pub async fn begin_cycle(&self) -> RefreshCycle {
        let token = CancellationToken::new();
        let mut in_flight = self.in_flight.lock().await;
        if let Some(previous) = in_flight.replace(token.clone()) {
            previous.cancel();
        }
        let id = self.latest_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        drop(in_flight);

        RefreshCycle { id, token }
    }

    /// Apply the result of `cycle` unless a newer cycle has started since.
    pub async fn commit(
        &self,
        cycle: &RefreshCycle,
        result: Result<Vec<Email>, FeedError>,
    ) -> CycleOutcome {
        let mut snapshot = self.snapshot.write().await;

        if cycle.id != self.latest_cycle.load(Ordering::SeqCst) {
            return CycleOutcome::Superseded;
        }

        match result {
            Ok(emails) => {
                let count = emails.len();
                *snapshot = FeedSnapshot {
                    emails: Arc::new(emails),
                    fetched_at: Some(Utc::now()),
                    last_error: None,
                    cycle: cycle.id,
                };
                CycleOutcome::Replaced { count }
            }
            Err(e) => {
                snapshot.last_error = Some(e.to_string());
                snapshot.cycle = cycle.id;
                CycleOutcome::Failed(e)
            }
        }
    }

    /// Cancel the in-flight cycle, if any.
    pub async fn cancel_in_flight(&self) {
        if let Some(token) = self.in_flight.lock().await.take() {
            token.cancel();
        }
    }
}

/// Run one complete ingestion cycle against `store`.
pub async fn run_cycle(source: &dyn EmailSource, store: &EmailStore) -> CycleOutcome {
    let cycle = store.begin_cycle().await;

    let result = tokio::select! {
        _ = cycle.token.cancelled() => {
            debug!(cycle = cycle.id, "Feed refresh superseded before completion");
            return CycleOutcome::Superseded;
        }
        result = source.fetch_emails() => result,
    };

    let outcome = store.commit(&cycle, result).await;
    match &outcome {
        CycleOutcome::Replaced { count } => {
            info!(cycle = cycle.id, count, "Email snapshot replaced");
        }
        CycleOutcome::Failed(e) => {
            error!(cycle = cycle.id, error = %e, "Feed refresh failed, keeping previous snapshot");
        }
        CycleOutcome::Superseded => {
            debug!(cycle = cycle.id, "Feed refresh result discarded, newer cycle running");
        }
    }
    outcome
}

/// Spawn the polling loop. The first cycle starts immediately.
///
/// Cycles run on their own tasks so a slow fetch does not delay the timer;
/// the next tick cancels it instead. Cancel `shutdown` to stop polling.
pub fn spawn_feed_refresher(
    source: Arc<dyn EmailSource>,
    store: Arc<EmailStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Feed refresher started, polling every {}s", interval.as_secs());

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    store.cancel_in_flight().await;
                    info!("Feed refresher shutting down");
                    return;
                }
                _ = tick.tick() => {}
            }

            let source = Arc::clone(&source);
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                run_cycle(source.as_ref(), &store).await;
            });
        }
    })
}
