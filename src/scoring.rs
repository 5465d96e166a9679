//! Relevance formula: log-normalised activity features with exponential age decay.

use thiserror::Error;

use crate::store::models::GroupMetrics;

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weight {name} must be finite, got {value}")]
    NonFiniteWeight { name: &'static str, value: f64 },
    #[error("decay rate phy must be finite and > 0, got {0}")]
    InvalidDecayRate(f64),
}

/// Feature weights and decay rate. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    w1: f64,
    w2: f64,
    w3: f64,
    w4: f64,
    w5: f64,
    phy: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            w1: 0.3,
            w2: 0.3,
            w3: 0.05,
            w4: 0.05,
            w5: 0.3,
            phy: 0.02,
        }
    }
}

impl ScoringWeights {
    /// 重みと減衰率を検証して構築する。
    ///
    /// # Errors
    /// 重みが有限でない場合、または `phy` が正の有限値でない場合は [`WeightsError`] を返す。
    pub fn new(
        w1: f64,
        w2: f64,
        w3: f64,
        w4: f64,
        w5: f64,
        phy: f64,
    ) -> Result<Self, WeightsError> {
        for (name, value) in [("w1", w1), ("w2", w2), ("w3", w3), ("w4", w4), ("w5", w5)] {
            if !value.is_finite() {
                return Err(WeightsError::NonFiniteWeight { name, value });
            }
        }
        if !phy.is_finite() || phy <= 0.0 {
            return Err(WeightsError::InvalidDecayRate(phy));
        }
        Ok(Self {
            w1,
            w2,
            w3,
            w4,
            w5,
            phy,
        })
    }

    /// Weight of the total article count.
    #[must_use]
    pub const fn w1(&self) -> f64 {
        self.w1
    }

    /// Weight of the distinct source count.
    #[must_use]
    pub const fn w2(&self) -> f64 {
        self.w2
    }

    /// Weight of the last-hour article count.
    #[must_use]
    pub const fn w3(&self) -> f64 {
        self.w3
    }

    /// Weight of the average source relevance.
    #[must_use]
    pub const fn w4(&self) -> f64 {
        self.w4
    }

    /// Weight of the view count.
    #[must_use]
    pub const fn w5(&self) -> f64 {
        self.w5
    }

    #[must_use]
    pub const fn phy(&self) -> f64 {
        self.phy
    }

    /// Age decay factor for a group that is `age_hours` old.
    #[must_use]
    pub fn age_decay(&self, age_hours: f64) -> f64 {
        (-self.phy * sanitize(age_hours)).exp()
    }

    /// Computes the relevance score of `metrics`. Pure: the same input always
    /// yields the same output.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, metrics: &GroupMetrics) -> f64 {
        let features = self.w1 * log_norm(metrics.article_count as f64)
            + self.w2 * log_norm(metrics.distinct_source_count as f64)
            + self.w3 * log_norm(metrics.recent_article_count as f64)
            + self.w4 * log_norm(metrics.average_source_relevance)
            + self.w5 * log_norm(metrics.views as f64);

        features * self.age_decay(metrics.group_age_seconds / SECONDS_PER_HOUR)
    }
}

/// `ln(1 + v)`; zero at zero, increasing, compresses large counts.
#[must_use]
pub fn log_norm(value: f64) -> f64 {
    sanitize(value).ln_1p()
}

// Store values are non-negative and finite; anything else counts as zero.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
