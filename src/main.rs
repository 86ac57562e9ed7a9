//! Security gateway binary.
//!
//! Boots the full stack: configuration (with hot reload), observability,
//! the shared stores, the security pipeline wrapped around the application
//! router, the admin API listener, and the maintenance task.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────┐
//!                    │                 SECURITY GATEWAY                   │
//!                    │                                                    │
//!   Client Request   │  ┌──────┐   ┌─────────┐   ┌───────────┐           │
//!   ─────────────────┼─▶│ ddos │──▶│ limiter │──▶│validation │──▶ handler│
//!                    │  └──┬───┘   └────┬────┘   └─────┬─────┘           │
//!                    │     │ block      │ 429          │ 400             │
//!                    │     ▼            ▼              ▼                 │
//!   Client Response  │  ┌────────────────────────────────────┐           │
//!   ◀────────────────┼──│ security headers + audit + monitor │◀──────────│
//!                    │  └────────────────────────────────────┘           │
//!                    │                                                    │
//!                    │  ┌──────────────────────────────────────────────┐ │
//!                    │  │           Cross-Cutting Concerns             │ │
//!                    │  │  ┌────────┐ ┌───────┐ ┌─────────┐ ┌───────┐  │ │
//!                    │  │  │ config │ │ store │ │observa- │ │ admin │  │ │
//!                    │  │  │+reload │ │       │ │ bility  │ │  API  │  │ │
//!                    │  │  └────────┘ └───────┘ └─────────┘ └───────┘  │ │
//!                    │  │  ┌──────────────────────────────────────┐    │ │
//!                    │  │  │   lifecycle: signals / maintenance   │    │ │
//!                    │  │  └──────────────────────────────────────┘    │ │
//!                    │  └──────────────────────────────────────────────┘ │
//!                    └────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{routing::get, Json, Router};
use tokio::net::TcpListener;

use security_gateway::audit::{MemoryAuditStore, TracingNotifier};
use security_gateway::config::loader::load_config;
use security_gateway::config::watcher::ConfigWatcher;
use security_gateway::http::{serve_admin, GatewayServer};
use security_gateway::lifecycle::{signals, spawn_maintenance, Shutdown};
use security_gateway::observability::{logging, metrics};
use security_gateway::store::MemoryStore;
use security_gateway::{SecurityConfig, SecurityGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => load_config(std::path::Path::new(path))?,
        None => SecurityConfig::default(),
    };

    logging::init_tracing(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = config_path.as_deref().unwrap_or("<defaults>"),
        "security-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Shared handles outliving any single pipeline instance.
    let store = Arc::new(MemoryStore::new());
    let audit_store = Arc::new(MemoryAuditStore::new());
    let notifier = Arc::new(TracingNotifier);

    let gateway = Arc::new(ArcSwap::from_pointee(SecurityGateway::new(
        store.clone(),
        audit_store.clone(),
        notifier.clone(),
        config.clone(),
    )));

    let shutdown = Arc::new(Shutdown::new());
    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    spawn_maintenance(
        gateway.clone(),
        store.clone(),
        config.maintenance.interval_secs,
        shutdown.subscribe(),
    );

    // Hot reload: a valid config file change swaps in a fresh pipeline
    // over the same stores.
    let _watcher = if let Some(path) = &config_path {
        let (watcher, mut update_rx) = ConfigWatcher::new(std::path::Path::new(path));
        let handle = watcher.run()?;
        let gateway = gateway.clone();
        let store = store.clone();
        let audit_store = audit_store.clone();
        let notifier = notifier.clone();
        tokio::spawn(async move {
            while let Some(new_config) = update_rx.recv().await {
                gateway.store(Arc::new(SecurityGateway::new(
                    store.clone(),
                    audit_store.clone(),
                    notifier.clone(),
                    new_config,
                )));
                tracing::info!("Configuration reloaded, pipeline replaced");
            }
        });
        Some(handle)
    } else {
        None
    };

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let gateway = gateway.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(gateway, admin_listener, shutdown).await {
                tracing::error!(error = %e, "Admin API server failed");
            }
        });
    }

    gateway
        .load_full()
        .audit()
        .log_system_event(
            "gateway_started",
            serde_json::json!({ "bind_address": config.listener.bind_address }),
        )
        .await;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .fallback(not_found);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    GatewayServer::new(gateway, app, shutdown)
        .run(listener)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "no such route" })),
    )
}
