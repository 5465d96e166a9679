use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::observability::metrics::Metrics;
use crate::scoring::ScoringWeights;
use crate::store::{GroupMetrics, RelevanceScore};

/// Middle stage: scores pending records and forwards everything downstream.
pub struct Scorer {
    weights: Arc<ScoringWeights>,
    metrics: Arc<Metrics>,
}

impl Scorer {
    #[must_use]
    pub fn new(weights: Arc<ScoringWeights>, metrics: Arc<Metrics>) -> Self {
        Self { weights, metrics }
    }

    /// Overwrites the score of `group` with the formula result.
    pub fn compute(&self, group: &mut GroupMetrics) {
        group.score = RelevanceScore::Computed(self.weights.score(group));
    }

    /// Computes the score of a pending record; any other record is returned untouched.
    #[must_use]
    pub fn apply(&self, mut group: GroupMetrics) -> GroupMetrics {
        if group.score.is_pending() {
            self.compute(&mut group);
            self.metrics.scores_computed.inc();
        } else {
            self.metrics.scores_passed_through.inc();
        }
        group
    }

    /// Consumes the input queue until cancellation or until either queue closes.
    pub async fn run(
        self,
        mut input_rx: mpsc::Receiver<GroupMetrics>,
        output_tx: mpsc::Sender<GroupMetrics>,
        cancel: CancellationToken,
    ) {
        info!("scorer started");

        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("scorer cancelled");
                    break;
                }
                received = input_rx.recv() => received,
            };

            let Some(group) = received else {
                info!("input queue closed; scorer stopping");
                break;
            };

            let scored = self.apply(group);
            debug!(group_id = %scored.group_id, score = ?scored.score, "scored group");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("scorer cancelled");
                    break;
                }
                sent = output_tx.send(scored) => {
                    if sent.is_err() {
                        warn!("output queue closed; scorer stopping");
                        break;
                    }
                }
            }
        }

        info!("scorer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scorer() -> (Scorer, Arc<Metrics>) {
        let metrics = Metrics::detached();
        (
            Scorer::new(Arc::new(ScoringWeights::default()), Arc::clone(&metrics)),
            metrics,
        )
    }

    fn active_group(id: i64) -> GroupMetrics {
        GroupMetrics {
            article_count: 10,
            distinct_source_count: 3,
            recent_article_count: 2,
            views: 100,
            average_source_relevance: 0.5,
            time_since_last_article_seconds: 60.0,
            group_age_seconds: 3600.0,
            ..GroupMetrics::pending(id)
        }
    }

    #[test]
    fn apply_computes_pending_record() {
        let (scorer, metrics) = scorer();

        let scored = scorer.apply(active_group(1));

        let score = scored.score.value().expect("computed score");
        assert!((score - 2.5436).abs() < 1e-3, "score was {score}");
        assert!((metrics.scores_computed.get() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn apply_passes_finalised_zero_through_unchanged() {
        let (scorer, metrics) = scorer();
        let mut aged = active_group(2);
        aged.group_age_seconds = 90_000.0;
        aged.score = RelevanceScore::Computed(0.0);

        let forwarded = scorer.apply(aged.clone());

        assert_eq!(forwarded, aged);
        assert_eq!(forwarded.score.value().map(f64::to_bits), Some(0.0_f64.to_bits()));
        assert!((metrics.scores_passed_through.get() - 1.0).abs() < f64::EPSILON);
        assert!(metrics.scores_computed.get().abs() < f64::EPSILON);
    }

    #[test]
    fn apply_is_idempotent() {
        let (scorer, _) = scorer();
        let once = scorer.apply(active_group(3));
        let twice = scorer.apply(once.clone());
        assert_eq!(
            once.score.value().map(f64::to_bits),
            twice.score.value().map(f64::to_bits)
        );
    }

    #[test]
    fn compute_overwrites_any_score() {
        let (scorer, _) = scorer();
        let mut group = active_group(4);
        group.score = RelevanceScore::Computed(42.0);

        scorer.compute(&mut group);

        let score = group.score.value().expect("computed score");
        assert!((score - 2.5436).abs() < 1e-3);
    }

    #[tokio::test]
    async fn run_preserves_fifo_order_and_stops_on_closed_input() {
        let (scorer, _) = scorer();
        let (input_tx, input_rx) = mpsc::channel(8);
        let (output_tx, mut output_rx) = mpsc::channel(8);

        for id in [5, 1, 3] {
            input_tx.send(active_group(id)).await.expect("send");
        }
        drop(input_tx);

        scorer.run(input_rx, output_tx, CancellationToken::new()).await;

        let mut ids = Vec::new();
        while let Some(group) = output_rx.recv().await {
            assert!(!group.score.is_pending());
            ids.push(group.group_id.0);
        }
        assert_eq!(ids, vec![5, 1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_unblocks_full_output_queue() {
        let (scorer, _) = scorer();
        let (input_tx, input_rx) = mpsc::channel(8);
        let (output_tx, _output_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        for id in 0..4 {
            input_tx.send(active_group(id)).await.expect("send");
        }

        let handle = tokio::spawn(scorer.run(input_rx, output_tx, cancel.clone()));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scorer must stop promptly")
            .expect("scorer task");
    }

    #[tokio::test]
    async fn run_stops_when_output_queue_closes() {
        let (scorer, _) = scorer();
        let (input_tx, input_rx) = mpsc::channel(8);
        let (output_tx, output_rx) = mpsc::channel(8);
        drop(output_rx);

        input_tx.send(active_group(1)).await.expect("send");

        tokio::time::timeout(
            Duration::from_secs(1),
            scorer.run(input_rx, output_tx, CancellationToken::new()),
        )
        .await
        .expect("scorer must stop once the output queue is closed");
    }
}
