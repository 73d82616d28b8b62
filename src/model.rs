use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded observation of how the user did. Never mutated after recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub timestamp: DateTime<Utc>,
    /// 0-100.
    pub performance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_tag: Option<String>,
}

impl PerformanceSample {
    pub fn new(timestamp: DateTime<Utc>, performance: f64) -> Self {
        Self {
            timestamp,
            performance,
            accuracy: None,
            time_taken_seconds: None,
            mood_tag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressSnapshot {
    pub completion_ratio: f64,
    pub accuracy_ratio: f64,
    pub test_performance_ratio: f64,
    #[serde(default = "default_category_tag")]
    pub category_tag: String,
}

fn default_category_tag() -> String {
    Category::General.as_str().to_string()
}

impl UserProgressSnapshot {
    /// Weighted blend of the three ratios on a 0-100 scale.
    pub fn base_score(&self) -> f64 {
        let completion = self.completion_ratio.clamp(0.0, 1.0) * 100.0;
        let accuracy = self.accuracy_ratio.clamp(0.0, 1.0) * 100.0;
        let tests = self.test_performance_ratio.clamp(0.0, 1.0) * 100.0;
        completion * 0.4 + accuracy * 0.35 + tests * 0.25
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Ews,
    Obc,
    Sc,
    St,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::General,
        Category::Ews,
        Category::Obc,
        Category::Sc,
        Category::St,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Ews => "ews",
            Self::Obc => "obc",
            Self::Sc => "sc",
            Self::St => "st",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "general" | "gen" => Some(Self::General),
            "ews" => Some(Self::Ews),
            "obc" => Some(Self::Obc),
            "sc" => Some(Self::Sc),
            "st" => Some(Self::St),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactorKind {
    TimeDecay,
    Consistency,
    LearningVelocity,
    StressImpact,
}

/// Multipliers derived from a user's recent history, rebuilt on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveFactors {
    pub time_decay: f64,
    pub consistency: f64,
    pub learning_velocity: f64,
    pub stress_impact: f64,
    pub confidence_level: f64,
    pub sample_count: usize,
    /// Factors that fell back to their cold-start constant.
    #[serde(default)]
    pub defaulted: Vec<FactorKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPrediction {
    pub subject: String,
    pub score: u32,
    pub confidence: f64,
    pub difficulty: f64,
    pub volatility: f64,
    pub max_possible_score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: u32,
    pub upper: u32,
}

impl ConfidenceInterval {
    pub fn contains(&self, rank: u32) -> bool {
        (self.lower..=self.upper).contains(&rank)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankPrediction {
    pub predicted_rank: u32,
    pub category_rank: u32,
    pub category: Category,
    /// 0-100.
    pub percentile: f64,
    pub confidence_interval: ConfidenceInterval,
    /// 0-1.
    pub qualification_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub user_id: String,
    pub factors: AdaptiveFactors,
    pub subjects: BTreeMap<String, SubjectPrediction>,
    pub total_score: u32,
    pub rank: RankPrediction,
    pub low_confidence: bool,
    pub generated_at: DateTime<Utc>,
}
