//! Admin API behavior: auth, alert lifecycle, audit queries, bans.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use security_gateway::admin::{setup_admin_router, AdminState};
use security_gateway::audit::Severity;
use security_gateway::monitor::Incident;
use security_gateway::SecurityConfig;

mod common;

use common::Harness;

const KEY: &str = "integration-test-key";

fn harness() -> Harness {
    let mut config = SecurityConfig::default();
    config.admin.api_key = KEY.to_string();
    config.monitoring.alert_threshold = 2;
    Harness::new(config)
}

fn admin_app(harness: &Harness) -> axum::Router {
    setup_admin_router(AdminState {
        gateway: harness.gateway.clone(),
    })
}

fn get(path: &str, key: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("authorization", format!("Bearer {key}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, key: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("authorization", format!("Bearer {key}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn bad_bearer_tokens_are_rejected() {
    let harness = harness();
    let app = admin_app(&harness);

    let no_auth = Request::builder()
        .method("GET")
        .uri("/admin/status")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(no_auth).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get("/admin/status", "wrong-key"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_reports_version_and_counts() {
    let harness = harness();
    let response = admin_app(&harness)
        .oneshot(get("/admin/status", KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = json_body(response).await;
    assert_eq!(status["status"], "operational");
    assert_eq!(status["active_bans"], 0);
}

#[tokio::test]
async fn alert_lifecycle_via_api() {
    let harness = harness();
    let app = admin_app(&harness);
    let monitor = harness.gateway.load_full().monitor().clone();

    // Threshold 2: two incidents raise one alert.
    for _ in 0..2 {
        monitor
            .record_incident(Incident::new(
                "suspicious_endpoint_access",
                "10.0.0.9",
                Severity::Medium,
                json!({}),
            ))
            .await;
    }

    let response = app.clone().oneshot(get("/admin/alerts", KEY)).await.unwrap();
    let alerts = json_body(response).await;
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    let id = alerts[0]["id"].as_str().unwrap().to_string();

    let resolve = post_json(&format!("/admin/alerts/{id}/resolve"), KEY, json!({}));
    let response = app.clone().oneshot(resolve).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["resolved"], true);

    // Second resolve conflicts; the active list is empty.
    let resolve = post_json(&format!("/admin/alerts/{id}/resolve"), KEY, json!({}));
    let response = app.clone().oneshot(resolve).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.oneshot(get("/admin/alerts", KEY)).await.unwrap();
    assert!(json_body(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn audit_query_and_csv_export() {
    let harness = harness();
    let app = admin_app(&harness);
    let audit = harness.gateway.load_full().audit().clone();

    audit
        .log_security_event(
            "rate_limit_exceeded",
            "10.0.0.1",
            "curl/8",
            json!({"path": "/page"}),
            None,
        )
        .await;
    audit
        .log_security_event("auth_login_failed", "10.0.0.2", "curl/8", json!({}), None)
        .await;

    let response = app
        .clone()
        .oneshot(get("/admin/audit?event=rate_limit_exceeded", KEY))
        .await
        .unwrap();
    let page = json_body(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["entries"][0]["client_ip"], "10.0.0.1");

    let response = app
        .clone()
        .oneshot(get("/admin/audit/export?format=csv", KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.lines().count() >= 3); // header + two entries

    let response = app.oneshot(get("/admin/audit/stats", KEY)).await.unwrap();
    let stats = json_body(response).await;
    assert_eq!(stats["total"], 2);
}

#[tokio::test]
async fn ban_management_via_api() {
    let harness = harness();
    let app = admin_app(&harness);

    let create = post_json(
        "/admin/bans",
        KEY,
        json!({"ip": "198.51.100.7", "reason": "abuse", "duration_secs": 600}),
    );
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.clone().oneshot(get("/admin/bans", KEY)).await.unwrap();
    let bans = json_body(response).await;
    assert_eq!(bans[0]["ip"], "198.51.100.7");

    let delete = Request::builder()
        .method("DELETE")
        .uri("/admin/bans/198.51.100.7")
        .header("authorization", format!("Bearer {KEY}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/admin/bans", KEY)).await.unwrap();
    assert!(json_body(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn limit_status_and_reset() {
    let harness = harness();
    let app = admin_app(&harness);
    let limiter = harness.gateway.load_full().limiter().clone();

    limiter.check_ip("10.0.0.3", "/page").await;
    limiter.check_ip("10.0.0.3", "/page").await;

    let response = app
        .clone()
        .oneshot(get("/admin/limits/status?ip=10.0.0.3&path=/page", KEY))
        .await
        .unwrap();
    let status = json_body(response).await;
    assert_eq!(status["limit"], 100);
    assert_eq!(status["remaining"], 98);

    let reset = post_json(
        "/admin/limits/reset",
        KEY,
        json!({"ip": "10.0.0.3", "path": "/page"}),
    );
    let response = app.clone().oneshot(reset).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get("/admin/limits/status?ip=10.0.0.3&path=/page", KEY))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["remaining"], 100);
}
