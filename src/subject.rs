use crate::config::{EstimatorConfig, SubjectDifficultyProfile};
use crate::error::{EstimatorError, Result};
use crate::model::{AdaptiveFactors, SubjectPrediction};

/// Maps a base score through the adaptive factors and a subject's difficulty.
pub struct SubjectScorePredictor<'a> {
    config: &'a EstimatorConfig,
}

impl<'a> SubjectScorePredictor<'a> {
    pub fn new(config: &'a EstimatorConfig) -> Self {
        Self { config }
    }

    /// Unknown subject codes are an error rather than a silent zero.
    pub fn predict(
        &self,
        subject: &str,
        base_score: f64,
        factors: &AdaptiveFactors,
    ) -> Result<SubjectPrediction> {
        let profile = self
            .config
            .profile(subject)
            .ok_or_else(|| EstimatorError::UnknownSubject(subject.to_string()))?;
        Ok(predict_with_profile(subject, profile, base_score, factors))
    }
}

pub fn predict_with_profile(
    subject: &str,
    profile: &SubjectDifficultyProfile,
    base_score: f64,
    factors: &AdaptiveFactors,
) -> SubjectPrediction {
    let base = if base_score.is_finite() {
        base_score.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let adjusted =
        base * (1.0 - profile.difficulty * 0.3) * factors.consistency * factors.time_decay;
    let score = adjusted
        .round()
        .clamp(0.0, f64::from(profile.max_possible_score)) as u32;
    let confidence = (factors.confidence_level * (1.0 - profile.volatility * 0.2)).clamp(0.0, 1.0);

    SubjectPrediction {
        subject: subject.to_string(),
        score,
        confidence,
        difficulty: profile.difficulty,
        volatility: profile.volatility,
        max_possible_score: profile.max_possible_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(consistency: f64, time_decay: f64, confidence_level: f64) -> AdaptiveFactors {
        AdaptiveFactors {
            time_decay,
            consistency,
            learning_velocity: 0.8,
            stress_impact: 0.9,
            confidence_level,
            sample_count: 20,
            defaulted: Vec::new(),
        }
    }

    #[test]
    fn applies_difficulty_and_factors() {
        let config = EstimatorConfig::default();
        let predictor = SubjectScorePredictor::new(&config);
        let prediction = predictor.predict("gs1", 80.0, &factors(1.0, 0.75, 0.8)).unwrap();

        // 80 * (1 - 0.21) * 1.0 * 0.75 = 47.4
        assert_eq!(prediction.score, 47);
        assert!((prediction.confidence - 0.8 * 0.97).abs() < 1e-9);
        assert_eq!(prediction.difficulty, 0.70);
        assert_eq!(prediction.max_possible_score, 250);
    }

    #[test]
    fn unknown_subject_is_rejected() {
        let config = EstimatorConfig::default();
        let predictor = SubjectScorePredictor::new(&config);
        let err = predictor.predict("xyz", 80.0, &factors(1.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, EstimatorError::UnknownSubject(code) if code == "xyz"));
    }

    #[test]
    fn score_is_capped_at_subject_maximum() {
        let profile = SubjectDifficultyProfile {
            difficulty: 0.0,
            volatility: 0.0,
            max_possible_score: 50,
        };
        let prediction = predict_with_profile("mini", &profile, 100.0, &factors(1.2, 1.0, 1.0));
        assert_eq!(prediction.score, 50);
    }

    #[test]
    fn higher_consistency_never_lowers_score() {
        let config = EstimatorConfig::default();
        let predictor = SubjectScorePredictor::new(&config);
        let low = predictor.predict("essay", 70.0, &factors(0.6, 0.7, 0.5)).unwrap();
        let high = predictor.predict("essay", 70.0, &factors(1.1, 0.7, 0.5)).unwrap();
        assert!(high.score >= low.score);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let config = EstimatorConfig::default();
        let predictor = SubjectScorePredictor::new(&config);
        let f = factors(0.9, 0.65, 0.7);
        assert_eq!(
            predictor.predict("gs3", 64.0, &f).unwrap(),
            predictor.predict("gs3", 64.0, &f).unwrap()
        );
    }
}
