//! Adaptive factors derived from a user's performance history.
//!
//! Every function here takes samples ordered most-recent-first, the way the
//! history store hands them out. Sparse histories never error: each factor
//! has a cold-start constant, and [`AdaptiveFactors::defaulted`] records
//! which ones were used.

use std::collections::HashMap;

use ndarray::{s, Array1};
use parking_lot::Mutex;
use tracing::debug;

use crate::model::{AdaptiveFactors, FactorKind, PerformanceSample};

pub const DEFAULT_TIME_DECAY: f64 = 0.5;
pub const DEFAULT_CONSISTENCY: f64 = 0.6;
pub const DEFAULT_LEARNING_VELOCITY: f64 = 0.8;
pub const STRESS_NO_WINDOW: f64 = 0.8;
pub const STRESS_NEUTRAL: f64 = 0.9;

pub const CONSISTENCY_MIN: f64 = 0.3;
pub const CONSISTENCY_MAX: f64 = 1.2;
pub const VELOCITY_MIN: f64 = 0.5;
pub const VELOCITY_MAX: f64 = 1.3;

const DECAY_RATE: f64 = 0.1;
const CONSISTENCY_MIN_SAMPLES: usize = 5;
const VELOCITY_MIN_SAMPLES: usize = 10;
const STRESS_WINDOW: usize = 7;
const CONFIDENCE_FULL_SAMPLES: f64 = 100.0;
const EPSILON: f64 = 1e-9;

/// Performance column as a 0-100 series, same order as the input.
pub fn performance_series(samples: &[PerformanceSample]) -> Array1<f64> {
    samples
        .iter()
        .map(|sample| {
            if sample.performance.is_finite() {
                sample.performance.clamp(0.0, 100.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Exponentially weighted mean performance on a 0-1 scale.
pub fn time_decay(samples: &[PerformanceSample]) -> f64 {
    if samples.is_empty() {
        return DEFAULT_TIME_DECAY;
    }

    let series = performance_series(samples);
    let (weighted, total_weight) = series
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(weighted, total), (index, value)| {
            let weight = (-DECAY_RATE * index as f64).exp();
            (weighted + value * weight, total + weight)
        });

    (weighted / total_weight / 100.0).clamp(0.0, 1.0)
}

/// Inverse of the coefficient of variation, scaled so a perfectly steady
/// history reaches the ceiling.
pub fn consistency(samples: &[PerformanceSample]) -> f64 {
    if samples.len() < CONSISTENCY_MIN_SAMPLES {
        return DEFAULT_CONSISTENCY;
    }

    let series = performance_series(samples);
    let mean = series.mean().unwrap_or(0.0);
    if mean <= EPSILON {
        return CONSISTENCY_MIN;
    }

    let variation = series.std(0.0) / mean;
    ((1.0 - variation) * CONSISTENCY_MAX).clamp(CONSISTENCY_MIN, CONSISTENCY_MAX)
}

/// Least-squares slope of performance against sample index, oldest first.
pub fn performance_slope(samples: &[PerformanceSample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }

    let chronological = performance_series(samples).slice(s![..;-1]).to_owned();
    let n = chronological.len() as f64;
    let xs = Array1::range(0.0, n, 1.0);

    let sum_x = xs.sum();
    let sum_y = chronological.sum();
    let sum_xy = xs.dot(&chronological);
    let sum_xx = xs.dot(&xs);

    let denominator = n * sum_xx - sum_x.powi(2);
    if denominator.abs() < 1e-10 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

/// Velocity reading from this history alone, without any smoothing.
pub fn learning_velocity(samples: &[PerformanceSample]) -> f64 {
    if samples.len() < VELOCITY_MIN_SAMPLES {
        return DEFAULT_LEARNING_VELOCITY;
    }
    (0.8 + performance_slope(samples) * 0.5).clamp(VELOCITY_MIN, VELOCITY_MAX)
}

/// Compares the latest week of samples with the week before it.
pub fn stress_impact(samples: &[PerformanceSample]) -> f64 {
    if samples.len() < STRESS_WINDOW {
        return STRESS_NO_WINDOW;
    }
    if samples.len() < STRESS_WINDOW * 2 {
        return STRESS_NEUTRAL;
    }

    let series = performance_series(samples);
    let recent = series.slice(s![..STRESS_WINDOW]).mean().unwrap_or(0.0);
    let prior = series
        .slice(s![STRESS_WINDOW..STRESS_WINDOW * 2])
        .mean()
        .unwrap_or(0.0);

    if prior <= EPSILON {
        return if recent > EPSILON { 1.1 } else { STRESS_NEUTRAL };
    }

    let change = (recent - prior) / prior;
    if change < -0.2 {
        0.7
    } else if change < -0.1 {
        0.8
    } else if change > 0.1 {
        1.1
    } else {
        STRESS_NEUTRAL
    }
}

pub fn confidence_level(sample_count: usize, consistency: f64) -> f64 {
    let volume = (sample_count as f64 / CONFIDENCE_FULL_SAMPLES).min(1.0);
    (0.6 * volume + 0.4 * consistency).clamp(0.0, 1.0)
}

/// Per-user smoothed learning velocity.
///
/// The read-modify-write for a user happens under one lock, so concurrent
/// predictions for the same user never lose an update.
#[derive(Debug, Default)]
pub struct VelocityStore {
    values: Mutex<HashMap<String, f64>>,
}

impl VelocityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<f64> {
        self.values.lock().get(user_id).copied()
    }

    /// Folds `fresh` into the cached value with weight `smoothing` and returns the result.
    pub fn blend(&self, user_id: &str, fresh: f64, smoothing: f64) -> f64 {
        let mut values = self.values.lock();
        let next = match values.get(user_id) {
            Some(previous) => previous * (1.0 - smoothing) + fresh * smoothing,
            None => fresh,
        }
        .clamp(VELOCITY_MIN, VELOCITY_MAX);
        values.insert(user_id.to_string(), next);
        next
    }

    pub fn reset(&self, user_id: &str) {
        self.values.lock().remove(user_id);
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FactorCalculator {
    smoothing: f64,
}

impl Default for FactorCalculator {
    fn default() -> Self {
        Self { smoothing: 0.3 }
    }
}

impl FactorCalculator {
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing: smoothing.clamp(f64::EPSILON, 1.0),
        }
    }

    /// Stateless calculation: learning velocity is this history's raw reading.
    pub fn calculate(&self, samples: &[PerformanceSample]) -> AdaptiveFactors {
        self.assemble(samples, learning_velocity(samples))
    }

    /// Same as [`calculate`](Self::calculate) but smooths learning velocity
    /// against the user's cached value.
    pub fn calculate_for_user(
        &self,
        user_id: &str,
        samples: &[PerformanceSample],
        store: &VelocityStore,
    ) -> AdaptiveFactors {
        let velocity = if samples.len() < VELOCITY_MIN_SAMPLES {
            DEFAULT_LEARNING_VELOCITY
        } else {
            store.blend(user_id, learning_velocity(samples), self.smoothing)
        };
        self.assemble(samples, velocity)
    }

    fn assemble(&self, samples: &[PerformanceSample], learning_velocity: f64) -> AdaptiveFactors {
        let count = samples.len();
        let consistency = consistency(samples);

        let mut defaulted = Vec::new();
        if count == 0 {
            defaulted.push(FactorKind::TimeDecay);
        }
        if count < CONSISTENCY_MIN_SAMPLES {
            defaulted.push(FactorKind::Consistency);
        }
        if count < VELOCITY_MIN_SAMPLES {
            defaulted.push(FactorKind::LearningVelocity);
        }
        if count < STRESS_WINDOW * 2 {
            defaulted.push(FactorKind::StressImpact);
        }
        if !defaulted.is_empty() {
            debug!(samples = count, ?defaulted, "adaptive factors using cold-start defaults");
        }

        AdaptiveFactors {
            time_decay: time_decay(samples),
            consistency,
            learning_velocity,
            stress_impact: stress_impact(samples),
            confidence_level: confidence_level(count, consistency),
            sample_count: count,
            defaulted,
        }
    }
}
