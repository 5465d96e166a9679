//! ストアとパイプライン間でやり取りされるグループ指標モデル。
use std::fmt;

/// Groups older than this are no longer scored and are forced to zero.
pub const ELIGIBILITY_WINDOW_SECS: f64 = 24.0 * 3600.0;

/// `groups.id` の主キー。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relevance score of a group for the current refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelevanceScore {
    /// Not computed yet; the scorer must fill it in.
    Pending,
    /// Final for this cycle. `0.0` is a legitimate value.
    Computed(f64),
}

impl RelevanceScore {
    /// ストアが返す初期状態を、グループの経過秒数から決定する。
    ///
    /// 24時間以上経過したグループは `Computed(0.0)` として確定し、
    /// それ以外は `Pending` としてスコア計算対象になる。
    #[must_use]
    pub fn initial_for_age(group_age_seconds: f64) -> Self {
        if group_age_seconds >= ELIGIBILITY_WINDOW_SECS {
            Self::Computed(0.0)
        } else {
            Self::Pending
        }
    }

    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Pending => None,
            Self::Computed(value) => Some(value),
        }
    }
}

/// One eligible group's activity metrics, in flight through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMetrics {
    pub group_id: GroupId,
    pub article_count: u64,
    pub distinct_source_count: u64,
    /// Articles published within the last hour.
    pub recent_article_count: u64,
    pub views: u64,
    /// 0.0 when the group has no rated sources.
    pub average_source_relevance: f64,
    pub time_since_last_article_seconds: f64,
    pub group_age_seconds: f64,
    pub score: RelevanceScore,
}

impl GroupMetrics {
    /// Empty metrics for `group_id` with a pending score.
    #[must_use]
    pub fn pending(group_id: i64) -> Self {
        Self {
            group_id: GroupId(group_id),
            article_count: 0,
            distinct_source_count: 0,
            recent_article_count: 0,
            views: 0,
            average_source_relevance: 0.0,
            time_since_last_article_seconds: 0.0,
            group_age_seconds: 0.0,
            score: RelevanceScore::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, RelevanceScore::Pending)]
    #[case(3600.0, RelevanceScore::Pending)]
    #[case(86_399.9, RelevanceScore::Pending)]
    #[case(86_400.0, RelevanceScore::Computed(0.0))]
    #[case(200_000.0, RelevanceScore::Computed(0.0))]
    fn initial_score_follows_eligibility_window(
        #[case] age_seconds: f64,
        #[case] expected: RelevanceScore,
    ) {
        assert_eq!(RelevanceScore::initial_for_age(age_seconds), expected);
    }

    #[test]
    fn computed_zero_is_not_pending() {
        let score = RelevanceScore::Computed(0.0);
        assert!(!score.is_pending());
        assert_eq!(score.value(), Some(0.0));
        assert_eq!(RelevanceScore::Pending.value(), None);
    }

    #[test]
    fn group_id_displays_inner_value() {
        assert_eq!(GroupId(42).to_string(), "42");
    }
}
