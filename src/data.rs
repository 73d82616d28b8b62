use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::error::{EstimatorError, Result};
use crate::model::PerformanceSample;

#[derive(Debug, Deserialize)]
struct HistoryRow {
    user_id: String,
    timestamp: DateTime<Utc>,
    performance: f64,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    time_taken_seconds: Option<u32>,
    #[serde(default)]
    mood: Option<String>,
}

/// Rejects samples the calculators cannot make sense of.
pub fn validate_sample(sample: &PerformanceSample) -> Result<()> {
    if !sample.performance.is_finite() || !(0.0..=100.0).contains(&sample.performance) {
        return Err(EstimatorError::InvalidSample(format!(
            "performance {} outside 0-100",
            sample.performance
        )));
    }
    if let Some(accuracy) = sample.accuracy {
        if !accuracy.is_finite() || !(0.0..=1.0).contains(&accuracy) {
            return Err(EstimatorError::InvalidSample(format!(
                "accuracy {accuracy} outside 0-1"
            )));
        }
    }
    Ok(())
}

/// Reads `user_id,timestamp,performance[,accuracy,time_taken_seconds,mood]` rows.
pub fn load_history_from_reader<R: Read>(reader: R) -> Result<Vec<(String, PerformanceSample)>> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in rdr.deserialize::<HistoryRow>().enumerate() {
        let row = result?;
        let sample = PerformanceSample {
            timestamp: row.timestamp,
            performance: row.performance,
            accuracy: row.accuracy,
            time_taken_seconds: row.time_taken_seconds,
            mood_tag: row.mood.filter(|mood| !mood.is_empty()),
        };
        validate_sample(&sample).map_err(|err| {
            // Line 1 is the header.
            EstimatorError::InvalidSample(format!("line {}: {err}", index + 2))
        })?;
        rows.push((row.user_id, sample));
    }

    Ok(rows)
}

pub fn load_history(path: impl AsRef<Path>) -> Result<Vec<(String, PerformanceSample)>> {
    let file = std::fs::File::open(path)?;
    load_history_from_reader(file)
}
