//! Admin API handlers.
//!
//! Read endpoints surface the subsystems' own query operations; mutating
//! endpoints are the only place a store error becomes a client-visible 500.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditPage, AuditQuery, AuditStats, ExportFormat};
use crate::error::SecurityError;
use crate::limiter::{Ban, LimitDecision, UsageReport};
use crate::monitor::{Alert, ResolveOutcome, SecurityMetricsReport};

use super::AdminState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub production: bool,
    pub active_bans: usize,
    pub active_alerts: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let gateway = state.gateway.load_full();
    let active_bans = gateway
        .limiter()
        .list_bans()
        .await
        .map(|bans| bans.len())
        .unwrap_or(0);
    let active_alerts = gateway.monitor().active_alerts().await.len();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        production: gateway.config().production,
        active_bans,
        active_alerts,
    })
}

// ── Alerts ───────────────────────────────────────────────────────────

pub async fn get_alerts(State(state): State<AdminState>) -> Json<Vec<Alert>> {
    Json(state.gateway.load_full().monitor().active_alerts().await)
}

pub async fn resolve_alert(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Response, SecurityError> {
    let gateway = state.gateway.load_full();
    match gateway.monitor().resolve_alert(&id).await? {
        ResolveOutcome::Resolved(alert) => Ok(Json(alert).into_response()),
        ResolveOutcome::AlreadyResolved => Ok((
            StatusCode::CONFLICT,
            Json(json!({ "error": "alert already resolved" })),
        )
            .into_response()),
        ResolveOutcome::NotFound => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no such alert" })),
        )
            .into_response()),
    }
}

// ── Security metrics ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct MetricsParams {
    pub window_mins: Option<u64>,
}

pub async fn get_metrics(
    State(state): State<AdminState>,
    Query(params): Query<MetricsParams>,
) -> Json<SecurityMetricsReport> {
    let window = params.window_mins.unwrap_or(60).clamp(1, 24 * 60);
    Json(state.gateway.load_full().monitor().security_metrics(window).await)
}

// ── Audit trail ──────────────────────────────────────────────────────

pub async fn get_audit(
    State(state): State<AdminState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditPage>, SecurityError> {
    let gateway = state.gateway.load_full();
    Ok(Json(gateway.audit().query(&query).await?))
}

pub async fn get_audit_stats(
    State(state): State<AdminState>,
) -> Result<Json<AuditStats>, SecurityError> {
    let gateway = state.gateway.load_full();
    Ok(Json(gateway.audit().stats().await?))
}

#[derive(Deserialize)]
pub struct ExportParams {
    pub format: ExportFormat,
}

pub async fn export_audit(
    State(state): State<AdminState>,
    Query(params): Query<ExportParams>,
    Query(query): Query<AuditQuery>,
) -> Result<Response, SecurityError> {
    let gateway = state.gateway.load_full();
    let body = gateway.audit().export(&query, params.format).await?;
    let content_type = match params.format {
        ExportFormat::Json => "application/json",
        ExportFormat::Csv => "text/csv",
    };
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

// ── Rate limits ──────────────────────────────────────────────────────

pub async fn get_limit_usage(
    State(state): State<AdminState>,
) -> Result<Json<UsageReport>, SecurityError> {
    let gateway = state.gateway.load_full();
    Ok(Json(gateway.limiter().usage().await?))
}

#[derive(Deserialize)]
pub struct LimitTarget {
    pub ip: String,
    pub path: String,
}

pub async fn get_limit_status(
    State(state): State<AdminState>,
    Query(target): Query<LimitTarget>,
) -> Result<Json<LimitDecision>, SecurityError> {
    let gateway = state.gateway.load_full();
    Ok(Json(gateway.limiter().status(&target.ip, &target.path).await?))
}

pub async fn reset_limit(
    State(state): State<AdminState>,
    Json(target): Json<LimitTarget>,
) -> Result<StatusCode, SecurityError> {
    let gateway = state.gateway.load_full();
    gateway.limiter().reset(&target.ip, &target.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Bans ─────────────────────────────────────────────────────────────

pub async fn get_bans(State(state): State<AdminState>) -> Result<Json<Vec<Ban>>, SecurityError> {
    let gateway = state.gateway.load_full();
    Ok(Json(gateway.limiter().list_bans().await?))
}

#[derive(Deserialize)]
pub struct BanRequest {
    pub ip: String,
    pub reason: String,
    pub duration_secs: u64,
}

pub async fn create_ban(
    State(state): State<AdminState>,
    Json(request): Json<BanRequest>,
) -> Result<(StatusCode, Json<Ban>), SecurityError> {
    let gateway = state.gateway.load_full();
    let ban = gateway
        .limiter()
        .ban(
            &request.ip,
            &request.reason,
            std::time::Duration::from_secs(request.duration_secs),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ban)))
}

pub async fn delete_ban(
    State(state): State<AdminState>,
    Path(ip): Path<String>,
) -> Result<StatusCode, SecurityError> {
    let gateway = state.gateway.load_full();
    gateway.limiter().unban(&ip).await?;
    Ok(StatusCode::NO_CONTENT)
}
