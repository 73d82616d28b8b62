//! "Realistic" score and rank draws around a deterministic prediction.
//!
//! All randomness goes through [`RandomSource`]. Any `rand` generator is one,
//! so callers choose between entropy-seeded noise and a fixed ChaCha seed.

use std::collections::BTreeMap;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::model::{Prediction, RankPrediction, SubjectPrediction};

const SCORE_SPREAD: f64 = 0.1;

pub trait RandomSource {
    /// Uniform draw in [0, 1).
    fn next_unit(&mut self) -> f64;
}

impl<R: RngCore> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Always returns the same draw; pins outputs in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn from_entropy() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub low: u32,
    pub high: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedScore {
    pub score: u32,
    pub range: ScoreRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub subjects: BTreeMap<String, SimulatedScore>,
    pub total_score: u32,
    pub rank: u32,
}

fn spread(prediction: &SubjectPrediction) -> f64 {
    prediction.volatility * SCORE_SPREAD * f64::from(prediction.max_possible_score)
}

/// Band a realistic draw can land in.
pub fn score_range(prediction: &SubjectPrediction) -> ScoreRange {
    let max = f64::from(prediction.max_possible_score);
    let score = f64::from(prediction.score);
    let spread = spread(prediction);
    ScoreRange {
        low: (score - spread).round().clamp(0.0, max) as u32,
        high: (score + spread).round().clamp(0.0, max) as u32,
    }
}

pub fn realistic_score<R: RandomSource + ?Sized>(
    prediction: &SubjectPrediction,
    rng: &mut R,
) -> u32 {
    let offset = (rng.next_unit() * 2.0 - 1.0) * spread(prediction);
    (f64::from(prediction.score) + offset)
        .round()
        .clamp(0.0, f64::from(prediction.max_possible_score)) as u32
}

/// Uniform draw inside the prediction's confidence interval.
pub fn realistic_rank<R: RandomSource + ?Sized>(rank: &RankPrediction, rng: &mut R) -> u32 {
    let interval = rank.confidence_interval;
    let width = f64::from(interval.upper - interval.lower + 1);
    let offset = (rng.next_unit() * width).floor() as u32;
    (interval.lower + offset).min(interval.upper)
}

pub fn simulate<R: RandomSource + ?Sized>(prediction: &Prediction, rng: &mut R) -> Simulation {
    let subjects: BTreeMap<String, SimulatedScore> = prediction
        .subjects
        .iter()
        .map(|(code, subject)| {
            let simulated = SimulatedScore {
                score: realistic_score(subject, rng),
                range: score_range(subject),
            };
            (code.clone(), simulated)
        })
        .collect();
    let total_score = subjects.values().map(|s| s.score).sum();

    Simulation {
        subjects,
        total_score,
        rank: realistic_rank(&prediction.rank, rng),
    }
}
