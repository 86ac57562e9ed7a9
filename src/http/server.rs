//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the application router with the security pipeline layer
//! - Bind the public listener and serve with graceful shutdown
//! - Serve the admin API on its own listener, outside the pipeline

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::admin::{setup_admin_router, AdminState};
use crate::lifecycle::Shutdown;
use crate::pipeline::{self, SecurityGateway};

/// Public-facing server: the wrapped application behind the pipeline.
pub struct GatewayServer {
    gateway: Arc<ArcSwap<SecurityGateway>>,
    app: Router,
    shutdown: Arc<Shutdown>,
}

impl GatewayServer {
    /// Wrap `app` with the security pipeline. The gateway handle is
    /// swappable; a config reload replaces the pipeline between requests.
    pub fn new(
        gateway: Arc<ArcSwap<SecurityGateway>>,
        app: Router,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            gateway,
            app,
            shutdown,
        }
    }

    fn build_router(&self) -> Router {
        self.app
            .clone()
            .layer(middleware::from_fn_with_state(
                self.gateway.clone(),
                pipeline::layer,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let app = self
            .build_router()
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut shutdown_rx = self.shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Serve the admin API. Bearer-authenticated, never behind the pipeline.
pub async fn serve_admin(
    gateway: Arc<ArcSwap<SecurityGateway>>,
    listener: TcpListener,
    shutdown: Arc<Shutdown>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    let router = setup_admin_router(AdminState { gateway });
    let mut shutdown_rx = shutdown.subscribe();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
