//! Scheduler stage: periodic metric refreshes and the daily aged-group reset.

pub mod cadence;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::observability::metrics::Metrics;
use crate::store::{GroupMetrics, RelevanceStore};
use crate::util::error::is_transient;

pub use self::cadence::DailyCadence;

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    /// Every fetched record was enqueued, or the cycle was skipped after a store error.
    Completed,
    Cancelled,
    /// The input queue has no receiver left.
    Closed,
}

/// Source of wall-clock time used to place the daily reset.
pub type WallClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Feeds the input queue with every eligible group's metrics.
pub struct Scheduler<Tz: TimeZone = Local> {
    store: Arc<dyn RelevanceStore>,
    metrics: Arc<Metrics>,
    refresh_interval: Duration,
    reset_cadence: DailyCadence<Tz>,
    wall_clock: WallClock,
}

impl Scheduler<Local> {
    /// Resets at local midnight, read from the system clock.
    ///
    /// `refresh_interval` below one second is raised to one second.
    #[must_use]
    pub fn new(
        store: Arc<dyn RelevanceStore>,
        metrics: Arc<Metrics>,
        refresh_interval: Duration,
    ) -> Self {
        Self::with_cadence(
            store,
            metrics,
            refresh_interval,
            DailyCadence::midnight(Local),
            Arc::new(Utc::now),
        )
    }
}

impl<Tz: TimeZone> Scheduler<Tz> {
    /// Reset triggers are placed with `wall_clock`; tokio's clock drives the timers.
    #[must_use]
    pub fn with_cadence(
        store: Arc<dyn RelevanceStore>,
        metrics: Arc<Metrics>,
        refresh_interval: Duration,
        reset_cadence: DailyCadence<Tz>,
        wall_clock: WallClock,
    ) -> Self {
        Self {
            store,
            metrics,
            refresh_interval: refresh_interval.max(MIN_REFRESH_INTERVAL),
            reset_cadence,
            wall_clock,
        }
    }

    /// Runs one refresh immediately, then one per refresh interval, and resets
    /// aged groups at every local midnight.
    ///
    /// Returns when `cancel` fires or when the input queue is closed.
    pub async fn start_reading(
        self,
        input_tx: mpsc::Sender<GroupMetrics>,
        cancel: CancellationToken,
    ) {
        info!(
            refresh_interval_secs = self.refresh_interval.as_secs(),
            "scheduler started"
        );

        let mut refresh = interval_at(
            Instant::now() + self.refresh_interval,
            self.refresh_interval,
        );
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut next_reset = self.reset_cadence.next_run_after((self.wall_clock)());
        let reset_timer = sleep_until(self.reset_deadline(next_reset));
        tokio::pin!(reset_timer);
        info!(next_reset = %next_reset.to_rfc3339(), "scheduled daily relevance reset");

        if !self.handle_refresh(&input_tx, &cancel).await {
            return;
        }

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("scheduler cancelled");
                    break;
                }

                () = &mut reset_timer => {
                    if !self.reset_aged_groups(&cancel).await {
                        info!("scheduler cancelled during reset");
                        break;
                    }
                    next_reset = self
                        .reset_cadence
                        .next_run_after_fire(next_reset, (self.wall_clock)());
                    reset_timer.as_mut().reset(self.reset_deadline(next_reset));
                    info!(next_reset = %next_reset.to_rfc3339(), "scheduled daily relevance reset");
                }

                _ = refresh.tick() => {
                    if !self.handle_refresh(&input_tx, &cancel).await {
                        break;
                    }
                }
            }
        }

        info!("scheduler stopped");
    }

    /// Returns `false` when the scheduler must stop.
    async fn handle_refresh(
        &self,
        input_tx: &mpsc::Sender<GroupMetrics>,
        cancel: &CancellationToken,
    ) -> bool {
        match self.refresh(input_tx, cancel).await {
            RefreshOutcome::Completed => true,
            RefreshOutcome::Cancelled => {
                info!("scheduler cancelled during refresh");
                false
            }
            RefreshOutcome::Closed => {
                warn!("input queue closed; scheduler stopping");
                false
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    async fn refresh(
        &self,
        input_tx: &mpsc::Sender<GroupMetrics>,
        cancel: &CancellationToken,
    ) -> RefreshOutcome {
        let started = Instant::now();

        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => return RefreshOutcome::Cancelled,
            result = self.store.get_relevance_metrics() => result,
        };

        let groups = match fetched {
            Ok(groups) => groups,
            Err(err) => {
                self.metrics.fetch_failures.inc();
                error!(
                    error = %format_args!("{err:#}"),
                    transient = is_transient(&err),
                    "failed to fetch relevance metrics; skipping cycle"
                );
                return RefreshOutcome::Completed;
            }
        };

        let count = groups.len();
        self.metrics.groups_fetched.inc_by(count as f64);
        self.metrics.last_refresh_groups.set(count as f64);

        for metrics in groups {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return RefreshOutcome::Cancelled,
                sent = input_tx.send(metrics) => {
                    if sent.is_err() {
                        return RefreshOutcome::Closed;
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        self.metrics.refresh_duration.observe(elapsed.as_secs_f64());
        debug!(
            count,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "refresh cycle enqueued"
        );
        RefreshOutcome::Completed
    }

    /// Returns `false` if cancelled before the store answered.
    #[allow(clippy::cast_precision_loss)]
    async fn reset_aged_groups(&self, cancel: &CancellationToken) -> bool {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            result = self.store.make_relevance_zero() => result,
        };

        match result {
            Ok(rows) => {
                self.metrics.resets.inc_by(rows as f64);
                info!(count = rows, "reset relevance of aged groups");
            }
            Err(err) => {
                self.metrics.reset_failures.inc();
                error!(
                    error = %format_args!("{err:#}"),
                    transient = is_transient(&err),
                    "failed to reset relevance of aged groups"
                );
            }
        }
        true
    }

    fn reset_deadline(&self, next_reset: DateTime<Utc>) -> Instant {
        Instant::now() + cadence::duration_until(next_reset, (self.wall_clock)())
    }
}
