//! Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // Scheduler
    pub groups_fetched: Counter,
    pub fetch_failures: Counter,
    pub resets: Counter,
    pub reset_failures: Counter,
    pub refresh_duration: Histogram,
    pub last_refresh_groups: Gauge,

    // Scorer
    pub scores_computed: Counter,
    pub scores_passed_through: Counter,

    // Writer
    pub updates: Counter,
    pub update_failures: Counter,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に `registry` に登録されている場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            groups_fetched: register_counter_with_registry!(
                "relevance_groups_fetched_total",
                "Total number of group metrics fetched from the store",
                registry
            )?,
            fetch_failures: register_counter_with_registry!(
                "relevance_fetch_failures_total",
                "Refresh cycles skipped because the metrics query failed",
                registry
            )?,
            resets: register_counter_with_registry!(
                "relevance_resets_total",
                "Groups whose score was reset after leaving the eligibility window",
                registry
            )?,
            reset_failures: register_counter_with_registry!(
                "relevance_reset_failures_total",
                "Daily resets that failed",
                registry
            )?,
            refresh_duration: register_histogram_with_registry!(
                "relevance_refresh_duration_seconds",
                "Duration of a refresh cycle, fetch through last enqueue",
                registry
            )?,
            last_refresh_groups: register_gauge_with_registry!(
                "relevance_last_refresh_groups",
                "Number of groups returned by the most recent refresh",
                registry
            )?,
            scores_computed: register_counter_with_registry!(
                "relevance_scores_computed_total",
                "Pending groups scored by the scorer",
                registry
            )?,
            scores_passed_through: register_counter_with_registry!(
                "relevance_scores_passed_through_total",
                "Already finalised groups forwarded without scoring",
                registry
            )?,
            updates: register_counter_with_registry!(
                "relevance_updates_total",
                "Scores persisted to the store",
                registry
            )?,
            update_failures: register_counter_with_registry!(
                "relevance_update_failures_total",
                "Score updates that failed and were skipped",
                registry
            )?,
        })
    }

    /// Metrics bound to a private registry; nothing is exported.
    ///
    /// # Panics
    /// Never in practice: a fresh registry has no name collisions.
    #[must_use]
    pub fn detached() -> Arc<Self> {
        let registry = Registry::new();
        Arc::new(Self::new(&registry).expect("fresh registry accepts all metrics"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_on_one_registry_fails() {
        let registry = Registry::new();
        Metrics::new(&registry).expect("first registration");
        assert!(Metrics::new(&registry).is_err());
    }

    #[test]
    fn detached_metrics_are_independent() {
        let first = Metrics::detached();
        let second = Metrics::detached();
        first.updates.inc();
        assert!((second.updates.get() - 0.0).abs() < f64::EPSILON);
        assert!((first.updates.get() - 1.0).abs() < f64::EPSILON);
    }
}
