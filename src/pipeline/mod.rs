//! Security pipeline orchestrator.
//!
//! # Data Flow
//! ```text
//! handle(request, peer, handler)
//!     → ddos.rs (ban + frequency + shape heuristics)
//!     → limiter (tiered fixed windows)
//!     → validator (headers, URL, buffered body)
//!     → header sanity (audited, never blocks)
//!     → wrapped handler
//!     → headers.rs (fixed security headers on EVERY response)
//!     → audit trail + monitor telemetry
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed; an early rejection still flows through the
//!   decoration, audit, and telemetry tail
//! - Handler errors are audited and re-returned unchanged, undecorated
//! - The gateway is handle-only state: cheap to rebuild on config reload

pub mod client_ip;
pub mod ddos;
pub mod headers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use serde_json::{json, Value};

use crate::audit::{AlertNotifier, AuditLogger, AuditStore, Severity};
use crate::config::schema::AuditLogLevel;
use crate::config::SecurityConfig;
use crate::error::SecurityError;
use crate::limiter::RateLimiter;
use crate::monitor::{Incident, RequestMetrics, SecurityMonitor};
use crate::observability::metrics;
use crate::store::CounterStore;
use crate::validation::{detectors, InputValidator, ValidationError};

use client_ip::header_str;

struct RequestContext {
    method: String,
    url: String,
    path: String,
    client_ip: String,
    user_agent: String,
    started: Instant,
}

/// The assembled security boundary. Owns one instance of every stage and
/// the shared handles they run on.
pub struct SecurityGateway {
    store: Arc<dyn CounterStore>,
    config: SecurityConfig,
    limiter: Arc<RateLimiter>,
    validator: InputValidator,
    audit: Arc<AuditLogger>,
    monitor: Arc<SecurityMonitor>,
}

impl SecurityGateway {
    pub fn new(
        store: Arc<dyn CounterStore>,
        audit_store: Arc<dyn AuditStore>,
        notifier: Arc<dyn AlertNotifier>,
        config: SecurityConfig,
    ) -> Self {
        let audit = Arc::new(AuditLogger::new(
            audit_store,
            notifier.clone(),
            config.audit.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(store.clone(), config.rate_limit.clone()));
        let monitor = Arc::new(SecurityMonitor::new(
            store.clone(),
            audit.clone(),
            notifier,
            config.monitoring.clone(),
        ));
        let validator = InputValidator::new(config.input_validation.clone());
        Self {
            store,
            config,
            limiter,
            validator,
            audit,
            monitor,
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn monitor(&self) -> &Arc<SecurityMonitor> {
        &self.monitor
    }

    /// Run one request through every stage and the wrapped handler.
    pub async fn handle<F, Fut>(
        &self,
        request: Request,
        peer_addr: Option<SocketAddr>,
        handler: F,
    ) -> Result<Response, BoxError>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response, BoxError>>,
    {
        let ctx = RequestContext {
            method: request.method().to_string(),
            url: request.uri().to_string(),
            path: request.uri().path().to_string(),
            client_ip: client_ip::client_ip(request.headers(), peer_addr),
            user_agent: header_str(request.headers(), "user-agent")
                .unwrap_or("unknown")
                .to_string(),
            started: Instant::now(),
        };

        if let Some(err) = ddos::evaluate(
            self.store.as_ref(),
            &self.limiter,
            &self.config.ddos,
            &ctx.client_ip,
            request.headers(),
        )
        .await
        {
            metrics::record_blocked(err.category());
            self.audit
                .log_security_event(
                    "ddos_blocked",
                    &ctx.client_ip,
                    &ctx.user_agent,
                    json!({ "path": ctx.path, "category": err.category() }),
                    Some(Severity::High),
                )
                .await;
            return Ok(self.finish(err.into_response(), &ctx).await);
        }

        let decision = self.limiter.check_ip(&ctx.client_ip, &ctx.path).await;
        if !decision.allowed {
            metrics::record_blocked("rate_limit_exceeded");
            self.audit
                .log_security_event(
                    "rate_limit_exceeded",
                    &ctx.client_ip,
                    &ctx.user_agent,
                    json!({
                        "path": ctx.path,
                        "limit": decision.limit,
                        "retry_after_secs": decision.retry_after_secs,
                    }),
                    None,
                )
                .await;
            let err = SecurityError::RateLimited {
                limit: decision.limit,
                remaining: decision.remaining,
                reset_at_ms: decision.reset_at_ms,
                retry_after_secs: decision.retry_after_secs,
            };
            return Ok(self.finish(err.into_response(), &ctx).await);
        }

        let request = if self.config.input_validation.enabled {
            let (parts, body) = request.into_parts();
            let bytes = match to_bytes(body, self.config.input_validation.max_body_size).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    let errors = vec![ValidationError::new(
                        "size_limit",
                        "body",
                        format!(
                            "body exceeds {} bytes",
                            self.config.input_validation.max_body_size
                        ),
                    )];
                    return Ok(self.reject_invalid(errors, &ctx).await);
                }
            };
            let result = self
                .validator
                .validate(&parts.method, &parts.uri, &parts.headers, &bytes);
            if !result.valid {
                return Ok(self.reject_invalid(result.errors, &ctx).await);
            }
            Request::from_parts(parts, Body::from(bytes))
        } else {
            request
        };

        self.header_sanity(request.method(), request.headers(), &ctx)
            .await;

        match handler(request).await {
            Ok(response) => Ok(self.finish(response, &ctx).await),
            Err(err) => {
                self.audit
                    .log_security_event(
                        "middleware_error",
                        &ctx.client_ip,
                        &ctx.user_agent,
                        json!({ "path": ctx.path, "error": err.to_string() }),
                        Some(Severity::High),
                    )
                    .await;
                self.monitor
                    .record_incident(Incident::new(
                        "middleware_error",
                        &ctx.client_ip,
                        Severity::High,
                        json!({ "path": ctx.path }),
                    ))
                    .await;
                Err(err)
            }
        }
    }

    async fn reject_invalid(&self, errors: Vec<ValidationError>, ctx: &RequestContext) -> Response {
        metrics::record_blocked("input_validation_failed");
        let kinds: Vec<&str> = errors.iter().map(|e| e.kind.as_str()).collect();
        self.audit
            .log_security_event(
                "input_validation_failed",
                &ctx.client_ip,
                &ctx.user_agent,
                json!({ "path": ctx.path, "violations": kinds }),
                None,
            )
            .await;
        self.finish(SecurityError::Validation(errors).into_response(), ctx)
            .await
    }

    /// Audit-only anomaly check on request headers. Never blocks.
    async fn header_sanity(&self, method: &Method, headers: &HeaderMap, ctx: &RequestContext) {
        let mut findings: Vec<&str> = Vec::new();
        let mutating = matches!(
            *method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        );
        if mutating && !headers.contains_key("content-type") {
            findings.push("missing_content_type");
        }
        if mutating && !headers.contains_key("authorization") {
            findings.push("missing_authorization");
        }
        for name in ["x-forwarded-for", "user-agent", "referer"] {
            if let Some(value) = header_str(headers, name) {
                if value.contains('\0') || detectors::scan(value).is_some() {
                    findings.push("malicious_header_value");
                    break;
                }
            }
        }
        if !findings.is_empty() {
            self.audit
                .log_security_event(
                    "suspicious_headers",
                    &ctx.client_ip,
                    &ctx.user_agent,
                    json!({ "path": ctx.path, "findings": findings }),
                    Some(Severity::Low),
                )
                .await;
        }
    }

    /// Decoration, audit, and telemetry tail shared by every response path.
    async fn finish(&self, mut response: Response, ctx: &RequestContext) -> Response {
        headers::apply_security_headers(response.headers_mut(), &self.config);

        let status = response.status().as_u16();
        let duration_ms = ctx.started.elapsed().as_millis() as u64;
        let success = status < 400;

        let response_headers = (self.config.audit.log_level == AuditLogLevel::Full).then(|| {
            Value::Object(
                response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.to_string(),
                            Value::String(String::from_utf8_lossy(value.as_bytes()).to_string()),
                        )
                    })
                    .collect(),
            )
        });

        self.audit
            .log_request(crate::audit::RequestAudit {
                method: ctx.method.clone(),
                url: ctx.url.clone(),
                client_ip: ctx.client_ip.clone(),
                user_agent: ctx.user_agent.clone(),
                status,
                duration_ms,
                success,
                response_headers,
            })
            .await;

        if success && self.limiter.skips_successful() {
            self.limiter.uncount(&ctx.client_ip, &ctx.path).await;
        }

        self.monitor
            .record_request(RequestMetrics {
                client_ip: ctx.client_ip.clone(),
                path: ctx.path.clone(),
                method: ctx.method.clone(),
                status,
                duration_ms,
            })
            .await;

        metrics::record_request(&ctx.method, status, duration_ms);
        response
    }
}

/// axum adapter: mounts the gateway as a middleware layer. The gateway
/// handle is swappable so a config reload replaces the whole pipeline
/// without touching in-flight requests.
pub async fn layer(
    State(gateway): State<Arc<ArcSwap<SecurityGateway>>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let gateway = gateway.load_full();
    match gateway
        .handle(request, peer, |req| async move {
            Ok(next.run(req).await)
        })
        .await
    {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "Wrapped handler failed");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
