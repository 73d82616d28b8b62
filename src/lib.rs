//! Adaptive score and rank estimation for a UPSC preparation dashboard.
//!
//! A user's performance history is reduced to adaptive factors, the factors
//! scale a base progress score per subject, and the aggregate score is placed
//! on a reference distribution to estimate percentile, rank and the odds of
//! qualifying.

pub mod analytics;
pub mod api;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod factors;
pub mod logging;
pub mod model;
pub mod rank;
pub mod simulation;
pub mod store;
pub mod subject;

pub use config::EstimatorConfig;
pub use engine::PredictionEngine;
pub use error::{EstimatorError, Result};
