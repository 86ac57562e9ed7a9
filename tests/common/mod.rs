//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{middleware, Json, Router};

use security_gateway::audit::notify::test_support::RecordingNotifier;
use security_gateway::audit::{AuditStore, MemoryAuditStore};
use security_gateway::pipeline;
use security_gateway::store::{CounterStore, MemoryStore};
use security_gateway::{SecurityConfig, SecurityGateway};

pub struct Harness {
    pub gateway: Arc<ArcSwap<SecurityGateway>>,
    pub audit_store: Arc<MemoryAuditStore>,
    pub notifier: Arc<RecordingNotifier>,
    _audit_dir: tempfile::TempDir,
}

impl Harness {
    /// Gateway over a fresh in-memory store, audit files in a tempdir.
    pub fn new(mut config: SecurityConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), &mut config)
    }

    pub fn with_store(store: Arc<dyn CounterStore>, config: &mut SecurityConfig) -> Self {
        let audit_dir = tempfile::tempdir().unwrap();
        config.audit.log_dir = audit_dir.path().to_string_lossy().to_string();

        let audit_store = Arc::new(MemoryAuditStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(ArcSwap::from_pointee(SecurityGateway::new(
            store,
            audit_store.clone(),
            notifier.clone(),
            config.clone(),
        )));
        Self {
            gateway,
            audit_store,
            notifier,
            _audit_dir: audit_dir,
        }
    }

    /// Small application router wrapped with the pipeline layer.
    pub fn app(&self) -> Router {
        Router::new()
            .route("/healthz", get(|| async { Json(serde_json::json!({"status": "ok"})) }))
            .route("/api/items", get(|| async { Json(serde_json::json!(["a", "b"])) }))
            .route(
                "/api/profile",
                put(|body: axum::body::Bytes| async move {
                    (axum::http::StatusCode::OK, body).into_response()
                }),
            )
            .layer(middleware::from_fn_with_state(
                self.gateway.clone(),
                pipeline::layer,
            ))
    }

    pub async fn audit_events(&self, event: &str) -> usize {
        let page = self
            .audit_store
            .find(&security_gateway::audit::AuditQuery {
                event: Some(event.to_string()),
                page_size: Some(500),
                ..Default::default()
            })
            .await
            .unwrap();
        page.total
    }
}

/// Plain browser-looking GET request.
pub fn get_request(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("user-agent", "Mozilla/5.0")
        .header("accept-language", "en-US")
        .body(Body::empty())
        .unwrap()
}
