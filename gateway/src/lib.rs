//! RateBridge Gateway
//!
//! HTTP surface for latest rates, conversions and paged history. Every
//! request is correlated, role-checked and delegated to the
//! [`ConversionOrchestrator`](ratebridge_fx::ConversionOrchestrator).

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
