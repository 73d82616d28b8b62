use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::EstimatorConfig;
use crate::error::{EstimatorError, Result};
use crate::factors::{FactorCalculator, VelocityStore};
use crate::model::{Category, PerformanceSample, Prediction, UserProgressSnapshot};
use crate::rank::RankEstimator;
use crate::subject::SubjectScorePredictor;

/// History -> adaptive factors -> per-subject scores -> rank.
///
/// The engine owns the only mutable state of the pipeline, the per-user
/// learning-velocity cache, and is meant to be shared behind an `Arc`.
pub struct PredictionEngine {
    config: Arc<EstimatorConfig>,
    calculator: FactorCalculator,
    velocity: VelocityStore,
}

impl PredictionEngine {
    pub fn new(config: Arc<EstimatorConfig>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calculator: FactorCalculator::new(config.velocity_smoothing),
            config,
            velocity: VelocityStore::new(),
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn velocity_store(&self) -> &VelocityStore {
        &self.velocity
    }

    /// `history` must be most-recent-first; only the configured lookback is used.
    /// `subjects` empty means every configured subject.
    pub fn predict(
        &self,
        user_id: &str,
        history: &[PerformanceSample],
        progress: &UserProgressSnapshot,
        subjects: &[String],
    ) -> Result<Prediction> {
        let required = self.config.min_history_samples;
        if history.len() < required {
            return Err(EstimatorError::InsufficientHistory {
                required,
                available: history.len(),
            });
        }

        let window = &history[..history.len().min(self.config.lookback)];
        let factors = self
            .calculator
            .calculate_for_user(user_id, window, &self.velocity);

        let base_score = progress.base_score();
        let predictor = SubjectScorePredictor::new(&self.config);
        let codes: Vec<&str> = if subjects.is_empty() {
            self.config.subjects.keys().map(String::as_str).collect()
        } else {
            subjects.iter().map(String::as_str).collect()
        };

        let mut predictions = BTreeMap::new();
        for code in codes {
            let prediction = predictor.predict(code, base_score, &factors)?;
            predictions.insert(code.to_string(), prediction);
        }

        let total_score: u32 = predictions.values().map(|p| p.score).sum();
        let volatilities: Vec<f64> = predictions.values().map(|p| p.volatility).collect();
        let category = Category::from_tag(&progress.category_tag).unwrap_or_else(|| {
            debug!(tag = %progress.category_tag, "unknown category tag, using general");
            Category::General
        });
        let rank = RankEstimator::new(&self.config).estimate(
            f64::from(total_score),
            &volatilities,
            category,
        );
        let low_confidence = factors.confidence_level < self.config.low_confidence_threshold;

        info!(
            user_id,
            samples = window.len(),
            total_score,
            predicted_rank = rank.predicted_rank,
            low_confidence,
            "prediction computed"
        );

        Ok(Prediction {
            user_id: user_id.to_string(),
            factors,
            subjects: predictions,
            total_score,
            rank,
            low_confidence,
            generated_at: Utc::now(),
        })
    }
}
