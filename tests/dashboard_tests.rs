
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use queue_janitor::dashboard::{router, DashboardState};
use queue_janitor::{Driver, Janitor};
use test_harness::{claim, minutes_ago, test_config, FakeCluster, MemoryStore};

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

fn create_test_driver(store: &MemoryStore) -> Driver<MemoryStore, FakeCluster> {
    Driver::new(Janitor::new(store.clone(), FakeCluster::new(), test_config()))
}

#[tokio::test]
async fn test_healthz_endpoint() {
    let driver = create_test_driver(&MemoryStore::new());
    let app = router(DashboardState {
        stats: driver.stats(),
    });

    let (status, json) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_status_before_first_sweep() {
    let driver = create_test_driver(&MemoryStore::new());
    let app = router(DashboardState {
        stats: driver.stats(),
    });

    let (status, json) = get_json(app, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["queues"], serde_json::json!(["q"]));
    assert_eq!(json["sweeps"], 0);
    assert_eq!(json["total_repairs"], 0);
    assert!(json["last_sweep_at"].is_null());
    assert!(json["last_report"].is_null());
}

#[tokio::test]
async fn test_status_reflects_last_sweep() {
    let store = MemoryStore::new();
    claim(&store, "job-1", "dead", "predicting", &minutes_ago(60));
    claim(&store, "job-2", "finished", "done", &minutes_ago(60));
    let mut driver = create_test_driver(&store);
    let state = DashboardState {
        stats: driver.stats(),
    };

    driver.run_once().await.unwrap();
    let (_, json) = get_json(router(state), "/api/status").await;

    assert_eq!(json["sweeps"], 1);
    assert_eq!(json["last_sweep_repairs"], 2);
    assert_eq!(json["total_repairs"], 2);
    assert!(json["last_sweep_at"].is_string());
    assert_eq!(json["last_report"]["requeued"], 1);
    assert_eq!(json["last_report"]["finished"], 1);
    assert_eq!(json["last_report"]["processing_queues"], 2);
}

#[tokio::test]
async fn test_unknown_route_not_found() {
    let driver = create_test_driver(&MemoryStore::new());
    let app = router(DashboardState {
        stats: driver.stats(),
    });

    let response = app
        .oneshot(Request::builder().uri("/api/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
