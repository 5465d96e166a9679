//! Scheduler → Scorer → Writer, wired through two bounded queues and one
//! shared cancellation token.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::observability::metrics::Metrics;
use crate::scheduler::Scheduler;
use crate::scoring::ScoringWeights;
use crate::store::RelevanceStore;

pub mod scorer;
pub mod writer;

pub use scorer::Scorer;
pub use writer::Writer;

const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(capacity) => capacity,
    None => unreachable!(),
};
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Capacity of each of the two queues.
    pub queue_capacity: NonZeroUsize,
    pub refresh_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity(),
            refresh_interval: config.refresh_interval(),
        }
    }
}

/// Handle to the three running stages.
pub struct RelevancePipeline {
    cancel: CancellationToken,
    scheduler: JoinHandle<()>,
    scorer: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RelevancePipeline {
    /// Spawns all three stages on the current runtime.
    #[must_use]
    pub fn spawn(
        store: Arc<dyn RelevanceStore>,
        weights: Arc<ScoringWeights>,
        settings: PipelineSettings,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Self {
        let capacity = settings.queue_capacity.get();
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);

        let scheduler = Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            settings.refresh_interval,
        );
        let scorer = Scorer::new(weights, Arc::clone(&metrics));
        let writer = Writer::new(store, metrics);

        info!(
            queue_capacity = capacity,
            refresh_interval_secs = settings.refresh_interval.as_secs(),
            "starting relevance pipeline"
        );

        Self {
            scheduler: tokio::spawn(scheduler.start_reading(input_tx, cancel.clone())),
            scorer: tokio::spawn(scorer.run(input_rx, output_tx, cancel.clone())),
            writer: tokio::spawn(writer.start_updating(output_rx, cancel.clone())),
            cancel,
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels every stage and waits for all of them to return.
    ///
    /// # Errors
    /// Returns an error if any stage panicked.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.join().await
    }

    /// Waits for all three stages to return without cancelling them.
    ///
    /// # Errors
    /// Returns an error if any stage panicked.
    pub async fn join(self) -> Result<()> {
        let (scheduler, scorer, writer) = tokio::join!(self.scheduler, self.scorer, self.writer);

        let mut failed = Vec::new();
        for (stage, result) in [("scheduler", scheduler), ("scorer", scorer), ("writer", writer)] {
            if let Err(err) = result {
                error!(stage, error = %err, "pipeline stage terminated abnormally");
                failed.push(stage);
            }
        }

        if failed.is_empty() {
            info!("relevance pipeline stopped");
            Ok(())
        } else {
            Err(anyhow!("pipeline stages failed: {}", failed.join(", ")))
        }
    }
}
