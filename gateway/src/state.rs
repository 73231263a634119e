//! Shared handler state.

use axum::http::HeaderName;
use ratebridge_fx::ConversionOrchestrator;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::metrics::Metrics;

/// State cloned into every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConversionOrchestrator>,
    pub metrics: Arc<Metrics>,
    /// Trusted header carrying the caller's role.
    pub role_header: HeaderName,
}

impl AppState {
    pub fn new(orchestrator: Arc<ConversionOrchestrator>, role_header: HeaderName) -> Self {
        Self {
            orchestrator,
            metrics: Arc::new(Metrics::new()),
            role_header,
        }
    }

    /// Build orchestrator and state from configuration.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let role_header = config.role_header_name().map_err(anyhow::Error::msg)?;
        let orchestrator = ConversionOrchestrator::from_config(&config.fx)?;
        Ok(Self::new(Arc::new(orchestrator), role_header))
    }
}
