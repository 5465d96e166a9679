use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::observability::metrics::Metrics;
use crate::store::{GroupMetrics, RelevanceStore};
use crate::util::error::is_transient;

/// Last stage: persists each scored record, one at a time.
pub struct Writer {
    store: Arc<dyn RelevanceStore>,
    metrics: Arc<Metrics>,
}

impl Writer {
    #[must_use]
    pub fn new(store: Arc<dyn RelevanceStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Drains the output queue until it closes or `cancel` fires while waiting.
    ///
    /// A failed write is logged and the next record is processed.
    pub async fn start_updating(
        self,
        mut output_rx: mpsc::Receiver<GroupMetrics>,
        cancel: CancellationToken,
    ) {
        info!("writer started");

        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("writer cancelled");
                    break;
                }
                received = output_rx.recv() => received,
            };

            let Some(group) = received else {
                info!("output queue closed; writer stopping");
                break;
            };

            self.persist(&group).await;
        }

        info!("writer stopped");
    }

    async fn persist(&self, group: &GroupMetrics) {
        if group.score.is_pending() {
            warn!(group_id = %group.group_id, "skipping group without a computed score");
            return;
        }

        match self.store.update_relevance(group).await {
            Ok(()) => {
                self.metrics.updates.inc();
                debug!(group_id = %group.group_id, score = ?group.score, "relevance updated");
            }
            Err(err) => {
                self.metrics.update_failures.inc();
                error!(
                    group_id = %group.group_id,
                    error = %format_args!("{err:#}"),
                    transient = is_transient(&err),
                    "failed to update relevance"
                );
            }
        }
    }
}
