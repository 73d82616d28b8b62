use tracing::debug;

use crate::config::EstimatorConfig;
use crate::model::{Category, ConfidenceInterval, RankPrediction};

const TAIL_PROBABILITY: f64 = 0.01;

/// Abramowitz and Stegun 7.1.26; absolute error below 1.5e-7.
pub fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Turns an aggregate score into percentile, rank and qualification odds.
pub struct RankEstimator<'a> {
    config: &'a EstimatorConfig,
}

impl<'a> RankEstimator<'a> {
    pub fn new(config: &'a EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn percentile(&self, total_score: f64) -> f64 {
        if !total_score.is_finite() {
            return 0.0;
        }
        let population = &self.config.population;
        let z = (total_score - population.mean) / population.std_dev;
        (normal_cdf(z) * 100.0).clamp(0.0, 100.0)
    }

    pub fn rank_for_percentile(&self, percentile: f64) -> u32 {
        // An unvalidated config may carry an empty pool; rank 1 still exists.
        let pool = f64::from(self.config.candidate_pool.max(1));
        let rank = ((1.0 - percentile.clamp(0.0, 100.0) / 100.0) * pool).round();
        rank.max(1.0).min(pool) as u32
    }

    /// Unlisted categories fall back to the general multiplier of 1.0.
    pub fn category_rank(&self, rank: u32, category: Category) -> u32 {
        let multiplier = self.config.category_multiplier(category);
        (f64::from(rank) * multiplier).round().max(1.0) as u32
    }

    pub fn confidence_interval(&self, rank: u32, average_volatility: f64) -> ConfidenceInterval {
        let width = (1000.0 * average_volatility.clamp(0.0, 1.0)).round() as u32;
        ConfidenceInterval {
            lower: rank.saturating_sub(width).max(1),
            upper: rank.saturating_add(width).min(self.config.candidate_pool.max(1)),
        }
    }

    /// Piecewise-linear lookup over the configured breakpoints.
    pub fn qualification_probability(&self, rank: u32) -> f64 {
        let curve = &self.config.qualification_curve;
        let (first, last) = match (curve.first(), curve.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return TAIL_PROBABILITY,
        };

        if rank <= first.rank {
            return first.probability;
        }
        if rank > last.rank {
            return last.probability.min(TAIL_PROBABILITY);
        }

        curve
            .windows(2)
            .find(|pair| rank <= pair[1].rank)
            .map(|pair| {
                let (from, to) = (pair[0], pair[1]);
                let span = f64::from(to.rank - from.rank);
                let progress = f64::from(rank - from.rank) / span;
                from.probability + (to.probability - from.probability) * progress
            })
            .unwrap_or(last.probability)
    }

    pub fn estimate(
        &self,
        total_score: f64,
        volatilities: &[f64],
        category: Category,
    ) -> RankPrediction {
        let percentile = self.percentile(total_score);
        let predicted_rank = self.rank_for_percentile(percentile);
        let average_volatility = if volatilities.is_empty() {
            0.0
        } else {
            volatilities.iter().sum::<f64>() / volatilities.len() as f64
        };

        debug!(total_score, percentile, predicted_rank, %category, "rank estimated");

        RankPrediction {
            predicted_rank,
            category_rank: self.category_rank(predicted_rank, category),
            category,
            percentile,
            confidence_interval: self.confidence_interval(predicted_rank, average_volatility),
            qualification_probability: self.qualification_probability(predicted_rank),
        }
    }
}
