//! `RelevanceStore`トレイト - パイプラインが必要とするデータアクセス層の抽象化
use async_trait::async_trait;

use crate::store::models::GroupMetrics;

#[async_trait]
pub trait RelevanceStore: Send + Sync {
    /// Returns every group currently eligible for scoring, with its score
    /// pre-set to `Pending` or, for aged-out groups, `Computed(0.0)`.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    async fn get_relevance_metrics(&self) -> anyhow::Result<Vec<GroupMetrics>>;

    /// Persists the computed score of `metrics`, keyed by its group id.
    ///
    /// # Errors
    /// Returns an error if the score is still `Pending` or the write fails.
    async fn update_relevance(&self, metrics: &GroupMetrics) -> anyhow::Result<()>;

    /// Resets the score of every group past the eligibility window.
    /// Returns the number of rows reset.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    async fn make_relevance_zero(&self) -> anyhow::Result<u64>;

    /// 複数グループのスコアを順番に保存する。最初の失敗で中断する。
    ///
    /// # Errors
    /// 最初に失敗した `update_relevance` のエラーを返す。
    async fn update_relevance_batch(&self, metrics: &[GroupMetrics]) -> anyhow::Result<()> {
        for met in metrics {
            self.update_relevance(met).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{GroupId, RelevanceScore};
    use crate::test_support::InMemoryRelevanceStore;

    fn computed(id: i64) -> GroupMetrics {
        GroupMetrics {
            score: RelevanceScore::Computed(0.25),
            ..GroupMetrics::pending(id)
        }
    }

    #[tokio::test]
    async fn batch_update_stops_at_first_failure() {
        let store = InMemoryRelevanceStore::new();
        store.fail_updates_for(2);

        let result = store
            .update_relevance_batch(&[computed(1), computed(2), computed(3)])
            .await;

        assert!(result.is_err());
        assert_eq!(store.updates(), vec![(GroupId(1), 0.25)]);
    }

    #[tokio::test]
    async fn batch_update_persists_in_order() {
        let store = InMemoryRelevanceStore::new();

        store
            .update_relevance_batch(&[computed(3), computed(1)])
            .await
            .expect("batch update");

        assert_eq!(store.updates(), vec![(GroupId(3), 0.25), (GroupId(1), 0.25)]);
    }
}
