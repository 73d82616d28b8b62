use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, Result};
use crate::model::Category;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub estimator_config: Option<PathBuf>,
    pub history_csv: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            host,
            port,
            log_level,
            estimator_config: std::env::var_os("ESTIMATOR_CONFIG").map(PathBuf::from),
            history_csv: std::env::var_os("HISTORY_CSV").map(PathBuf::from),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDifficultyProfile {
    pub difficulty: f64,
    pub volatility: f64,
    pub max_possible_score: u32,
}

impl SubjectDifficultyProfile {
    const fn new(difficulty: f64, volatility: f64, max_possible_score: u32) -> Self {
        Self {
            difficulty,
            volatility,
            max_possible_score,
        }
    }
}

/// Historical distribution of aggregate scores used for the percentile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePopulation {
    pub mean: f64,
    pub std_dev: f64,
}

impl Default for ReferencePopulation {
    fn default() -> Self {
        Self {
            mean: 850.0,
            std_dev: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualificationBreakpoint {
    pub rank: u32,
    pub probability: f64,
}

fn default_subjects() -> BTreeMap<String, SubjectDifficultyProfile> {
    [
        ("gs1", SubjectDifficultyProfile::new(0.70, 0.15, 250)),
        ("gs2", SubjectDifficultyProfile::new(0.75, 0.20, 250)),
        ("gs3", SubjectDifficultyProfile::new(0.80, 0.25, 250)),
        ("gs4", SubjectDifficultyProfile::new(0.65, 0.30, 250)),
        ("essay", SubjectDifficultyProfile::new(0.60, 0.35, 250)),
        ("optional", SubjectDifficultyProfile::new(0.70, 0.20, 500)),
        ("csat", SubjectDifficultyProfile::new(0.50, 0.10, 200)),
    ]
    .into_iter()
    .map(|(code, profile)| (code.to_string(), profile))
    .collect()
}

fn default_categories() -> BTreeMap<Category, f64> {
    BTreeMap::from([
        (Category::General, 1.0),
        (Category::Ews, 0.9),
        (Category::Obc, 0.73),
        (Category::Sc, 0.6),
        (Category::St, 0.525),
    ])
}

fn default_qualification_curve() -> Vec<QualificationBreakpoint> {
    [(1, 0.95), (1000, 0.95), (2000, 0.60), (5000, 0.20), (10000, 0.01)]
        .into_iter()
        .map(|(rank, probability)| QualificationBreakpoint { rank, probability })
        .collect()
}

/// Every tunable table and threshold of the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimatorConfig {
    pub subjects: BTreeMap<String, SubjectDifficultyProfile>,
    pub categories: BTreeMap<Category, f64>,
    pub population: ReferencePopulation,
    pub candidate_pool: u32,
    pub qualification_curve: Vec<QualificationBreakpoint>,
    pub lookback: usize,
    pub velocity_smoothing: f64,
    pub low_confidence_threshold: f64,
    pub min_history_samples: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            subjects: default_subjects(),
            categories: default_categories(),
            population: ReferencePopulation::default(),
            candidate_pool: 15_000,
            qualification_curve: default_qualification_curve(),
            lookback: 100,
            velocity_smoothing: 0.3,
            low_confidence_threshold: 0.5,
            min_history_samples: 0,
        }
    }
}

impl EstimatorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn profile(&self, subject: &str) -> Option<&SubjectDifficultyProfile> {
        self.subjects.get(subject)
    }

    pub fn category_multiplier(&self, category: Category) -> f64 {
        self.categories.get(&category).copied().unwrap_or(1.0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subjects.is_empty() {
            return Err(invalid("at least one subject profile is required"));
        }
        for (code, profile) in &self.subjects {
            if !unit_range(profile.difficulty) {
                return Err(invalid(format!("subject {code}: difficulty must be within [0, 1]")));
            }
            if !unit_range(profile.volatility) {
                return Err(invalid(format!("subject {code}: volatility must be within [0, 1]")));
            }
            if profile.max_possible_score == 0 {
                return Err(invalid(format!("subject {code}: maxPossibleScore must be positive")));
            }
        }

        for category in Category::ALL {
            match self.categories.get(&category) {
                Some(m) if m.is_finite() && *m > 0.0 && *m <= 1.5 => {}
                Some(m) => {
                    return Err(invalid(format!(
                        "category {category}: multiplier {m} outside (0, 1.5]"
                    )));
                }
                None => return Err(invalid(format!("category {category}: missing multiplier"))),
            }
        }

        if !(self.population.mean.is_finite() && self.population.std_dev.is_finite())
            || self.population.std_dev <= 0.0
        {
            return Err(invalid("population stdDev must be a positive finite number"));
        }
        if self.candidate_pool == 0 {
            return Err(invalid("candidatePool must be at least 1"));
        }

        if self.qualification_curve.is_empty() {
            return Err(invalid("qualificationCurve must not be empty"));
        }
        for pair in self.qualification_curve.windows(2) {
            if pair[1].rank <= pair[0].rank {
                return Err(invalid("qualificationCurve ranks must be strictly increasing"));
            }
            if pair[1].probability > pair[0].probability {
                return Err(invalid("qualificationCurve probabilities must not increase"));
            }
        }
        if self.qualification_curve.iter().any(|point| !unit_range(point.probability)) {
            return Err(invalid("qualificationCurve probabilities must be within [0, 1]"));
        }

        if !(self.velocity_smoothing > 0.0 && self.velocity_smoothing <= 1.0) {
            return Err(invalid("velocitySmoothing must be within (0, 1]"));
        }
        if !unit_range(self.low_confidence_threshold) {
            return Err(invalid("lowConfidenceThreshold must be within [0, 1]"));
        }
        if self.lookback == 0 {
            return Err(invalid("lookback must be at least 1"));
        }

        Ok(())
    }
}

fn unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

fn invalid(message: impl Into<String>) -> EstimatorError {
    EstimatorError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EstimatorConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_default_tables() {
        let config = EstimatorConfig::from_toml_str(
            r#"
            candidatePool = 20000

            [population]
            mean = 900.0
            stdDev = 100.0
            "#,
        )
        .unwrap();

        assert_eq!(config.candidate_pool, 20_000);
        assert_eq!(config.population.mean, 900.0);
        assert_eq!(config.subjects.len(), 7);
        assert_eq!(config.category_multiplier(Category::St), 0.525);
    }

    #[test]
    fn subject_override_replaces_table() {
        let config = EstimatorConfig::from_toml_str(
            r#"
            [subjects.history]
            difficulty = 0.4
            volatility = 0.1
            maxPossibleScore = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.subjects.len(), 1);
        assert_eq!(config.profile("history").unwrap().max_possible_score, 300);
    }

    #[test]
    fn out_of_range_difficulty_is_rejected() {
        let err = EstimatorConfig::from_toml_str(
            r#"
            [subjects.gs1]
            difficulty = 1.4
            volatility = 0.1
            maxPossibleScore = 250
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, EstimatorError::Configuration(_)));
    }

    #[test]
    fn missing_category_is_rejected() {
        let mut config = EstimatorConfig::default();
        config.categories.remove(&Category::Sc);
        assert!(matches!(
            config.validate(),
            Err(EstimatorError::Configuration(message)) if message.contains("sc")
        ));
    }

    #[test]
    fn increasing_qualification_curve_is_rejected() {
        let mut config = EstimatorConfig::default();
        config.qualification_curve.push(QualificationBreakpoint {
            rank: 20_000,
            probability: 0.5,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_std_dev_is_rejected() {
        let mut config = EstimatorConfig::default();
        config.population.std_dev = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_surfaces_parse_error() {
        let err = EstimatorConfig::from_toml_str("candidatePool = \"many\"").unwrap_err();
        assert!(matches!(err, EstimatorError::Toml(_)));
    }
}
