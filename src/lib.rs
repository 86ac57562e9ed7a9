//! Request-Boundary Security Gateway Library

pub mod admin;
pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod limiter;
pub mod monitor;
pub mod observability;
pub mod pipeline;
pub mod store;
pub mod validation;

pub use config::schema::SecurityConfig;
pub use error::SecurityError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use pipeline::SecurityGateway;
