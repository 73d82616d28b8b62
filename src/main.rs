use std::error::Error;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::info;

use upsc_rank_estimator::api::{self, AppState};
use upsc_rank_estimator::config::{EstimatorConfig, ServerConfig};
use upsc_rank_estimator::data::load_history;
use upsc_rank_estimator::logging::init_tracing;
use upsc_rank_estimator::store::HistoryStore;
use upsc_rank_estimator::PredictionEngine;

async fn load_estimator_config(server: &ServerConfig) -> Result<EstimatorConfig, Box<dyn Error>> {
    match &server.estimator_config {
        Some(path) => {
            info!(path = %path.display(), "loading estimator configuration");
            let raw = tokio::fs::read_to_string(path).await?;
            Ok(EstimatorConfig::from_toml_str(&raw)?)
        }
        None => Ok(EstimatorConfig::default()),
    }
}

fn seed_history(server: &ServerConfig) -> Result<HistoryStore, Box<dyn Error>> {
    let store = HistoryStore::new();
    if let Some(path) = &server.history_csv {
        let rows = load_history(path)?;
        let loaded = rows.len();
        for (user_id, sample) in rows {
            store.append(&user_id, [sample]);
        }
        info!(
            path = %path.display(),
            samples = loaded,
            users = store.user_count(),
            "seeded performance history"
        );
    }
    Ok(store)
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let server = ServerConfig::from_env();
    init_tracing(&server.log_level);

    let config = load_estimator_config(&server).await?;
    info!(
        subjects = config.subjects.len(),
        candidate_pool = config.candidate_pool,
        "estimator configuration loaded"
    );

    let engine = PredictionEngine::new(Arc::new(config))?;
    let history = seed_history(&server)?;
    let state = web::Data::new(AppState::new(engine, history));

    let addr = server.bind_addr();
    info!(%addr, "starting UPSC rank estimator API");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
