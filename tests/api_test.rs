use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use upsc_rank_estimator::api::{self, AppState};
use upsc_rank_estimator::store::HistoryStore;
use upsc_rank_estimator::{EstimatorConfig, PredictionEngine};

fn state() -> web::Data<AppState> {
    let engine = PredictionEngine::new(std::sync::Arc::new(EstimatorConfig::default())).unwrap();
    web::Data::new(AppState::new(engine, HistoryStore::new()))
}

fn samples(count: usize, performance: f64) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|day| {
            json!({
                "timestamp": format!("2024-04-{:02}T09:00:00Z", day + 1),
                "performance": performance,
                "moodTag": "focused",
            })
        })
        .collect();
    Value::Array(items)
}

fn progress() -> Value {
    json!({
        "completionRatio": 0.7,
        "accuracyRatio": 0.75,
        "testPerformanceRatio": 0.6,
        "categoryTag": "sc",
    })
}

#[actix_web::test]
async fn health_reports_running() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn subjects_lists_difficulty_table() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let req = test::TestRequest::get().uri("/subjects").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["gs4"]["maxPossibleScore"], 250);
    assert_eq!(body["optional"]["maxPossibleScore"], 500);
}

#[actix_web::test]
async fn stored_history_feeds_prediction() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;

    let req = test::TestRequest::post()
        .uri("/users/asha/samples")
        .set_json(samples(20, 68.0))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sampleCount"], 20);

    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({ "userId": "asha", "progress": progress() }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["factors"]["sampleCount"], 20);
    assert_eq!(body["rank"]["category"], "sc");
    assert_eq!(body["subjects"].as_object().unwrap().len(), 7);
}

#[actix_web::test]
async fn inline_history_overrides_store() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({
            "userId": "ravi",
            "progress": progress(),
            "subjects": ["gs1", "essay"],
            "history": samples(3, 55.0),
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["factors"]["sampleCount"], 3);
    assert_eq!(body["lowConfidence"], true);
    assert_eq!(body["subjects"].as_object().unwrap().len(), 2);
}

#[actix_web::test]
async fn unknown_subject_is_unprocessable() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({ "userId": "ravi", "progress": progress(), "subjects": ["xyz"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNKNOWN_SUBJECT");
}

#[actix_web::test]
async fn out_of_range_sample_is_rejected() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let req = test::TestRequest::post()
        .uri("/users/asha/samples")
        .set_json(samples(2, 180.0))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn trend_requires_history() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let req = test::TestRequest::get().uri("/users/nobody/trend").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/users/asha/samples")
        .set_json(samples(10, 70.0))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/users/asha/trend").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["userId"], "asha");
    assert_eq!(body["moodBreakdown"]["focused"], 10);
    assert_eq!(body["chartData"]["performance"].as_array().unwrap().len(), 10);
}

#[actix_web::test]
async fn seeded_simulation_is_reproducible() {
    let app = test::init_service(App::new().app_data(state()).configure(api::configure)).await;
    let request = json!({ "userId": "meera", "progress": progress(), "seed": 42 });

    let req = test::TestRequest::post().uri("/simulate").set_json(&request).to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    let req = test::TestRequest::post().uri("/simulate").set_json(&request).to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(first["simulation"], second["simulation"]);
    let rank = first["simulation"]["rank"].as_u64().unwrap();
    let lower = first["prediction"]["rank"]["confidenceInterval"]["lower"].as_u64().unwrap();
    let upper = first["prediction"]["rank"]["confidenceInterval"]["upper"].as_u64().unwrap();
    assert!((lower..=upper).contains(&rank));
}
