//! Admin API: operational visibility and control over the gateway.
//!
//! Served on its own listener, bearer-authenticated, never routed through
//! the security pipeline.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::pipeline::SecurityGateway;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared handle for admin handlers. The gateway swaps on config reload.
#[derive(Clone)]
pub struct AdminState {
    pub gateway: Arc<ArcSwap<SecurityGateway>>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/alerts", get(get_alerts))
        .route("/admin/alerts/{id}/resolve", post(resolve_alert))
        .route("/admin/metrics", get(get_metrics))
        .route("/admin/audit", get(get_audit))
        .route("/admin/audit/stats", get(get_audit_stats))
        .route("/admin/audit/export", get(export_audit))
        .route("/admin/limits/usage", get(get_limit_usage))
        .route("/admin/limits/status", get(get_limit_status))
        .route("/admin/limits/reset", post(reset_limit))
        .route("/admin/bans", get(get_bans).post(create_ban))
        .route("/admin/bans/{ip}", delete(delete_ban))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
