use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analytics::TrendsAnalyzer;
use crate::data::validate_sample;
use crate::engine::PredictionEngine;
use crate::error::{EstimatorError, Result};
use crate::model::{PerformanceSample, Prediction, UserProgressSnapshot};
use crate::simulation::{self, Simulation};
use crate::store::HistoryStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PredictionEngine>,
    pub history: Arc<HistoryStore>,
}

impl AppState {
    pub fn new(engine: PredictionEngine, history: HistoryStore) -> Self {
        Self {
            engine: Arc::new(engine),
            history: Arc::new(history),
        }
    }

    /// Caller-supplied history wins over the stored one.
    fn resolve_history(
        &self,
        user_id: &str,
        supplied: Option<Vec<PerformanceSample>>,
    ) -> Result<Vec<PerformanceSample>> {
        match supplied {
            Some(mut samples) => {
                for sample in &samples {
                    validate_sample(sample)?;
                }
                samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                Ok(samples)
            }
            None => Ok(self
                .history
                .recent(user_id, self.engine.config().lookback)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub user_id: String,
    pub progress: UserProgressSnapshot,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub history: Option<Vec<PerformanceSample>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    pub user_id: String,
    pub progress: UserProgressSnapshot,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub prediction: Prediction,
    pub simulation: Simulation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponse {
    pub user_id: String,
    pub accepted: usize,
    pub sample_count: usize,
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("UPSC rank estimator is running!")
}

async fn list_subjects(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(&state.engine.config().subjects)
}

async fn append_samples(
    state: web::Data<AppState>,
    path: web::Path<String>,
    web::Json(samples): web::Json<Vec<PerformanceSample>>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    for sample in &samples {
        validate_sample(sample).inspect_err(|err| {
            warn!(%user_id, error = %err, "rejected sample batch");
        })?;
    }

    let accepted = samples.len();
    let sample_count = state.history.append(&user_id, samples);
    info!(%user_id, accepted, sample_count, "samples recorded");

    Ok(HttpResponse::Created().json(AppendResponse {
        user_id,
        accepted,
        sample_count,
    }))
}

async fn user_trend(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    if !state.history.contains(&user_id) {
        return Err(EstimatorError::UnknownUser(user_id));
    }

    let history = state
        .history
        .recent(&user_id, state.history.sample_count(&user_id));
    let trend = TrendsAnalyzer::new().generate_user_trend(&user_id, &history);
    Ok(HttpResponse::Ok().json(trend))
}

async fn predict(
    state: web::Data<AppState>,
    web::Json(req): web::Json<PredictRequest>,
) -> Result<HttpResponse> {
    let history = state.resolve_history(&req.user_id, req.history)?;
    let prediction = state
        .engine
        .predict(&req.user_id, &history, &req.progress, &req.subjects)
        .inspect_err(|err| warn!(user_id = %req.user_id, error = %err, "prediction rejected"))?;

    Ok(HttpResponse::Ok().json(prediction))
}

async fn simulate(
    state: web::Data<AppState>,
    web::Json(req): web::Json<SimulateRequest>,
) -> Result<HttpResponse> {
    let history = state.resolve_history(&req.user_id, None)?;
    let prediction = state
        .engine
        .predict(&req.user_id, &history, &req.progress, &req.subjects)?;

    let mut rng = match req.seed {
        Some(seed) => simulation::seeded(seed),
        None => simulation::from_entropy(),
    };
    let simulation = simulation::simulate(&prediction, &mut rng);

    Ok(HttpResponse::Ok().json(SimulateResponse {
        prediction,
        simulation,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/subjects", web::get().to(list_subjects))
        .route("/users/{user_id}/samples", web::post().to(append_samples))
        .route("/users/{user_id}/trend", web::get().to(user_trend))
        .route("/predict", web::post().to(predict))
        .route("/simulate", web::post().to(simulate));
}
