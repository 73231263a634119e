//! RateBridge FX Provider Layer
//!
//! Resilient access to upstream exchange-rate providers.
//!
//! # Features
//!
//! - Pluggable rate sources resolved by name
//! - TTL caching of latest rates and tables
//! - Retry with exponential backoff and a per-provider circuit breaker
//! - Day-by-day historical ranges that tolerate failed days
//! - Correlation IDs and cancellation carried through every call
//!
//! # Example
//!
//! ```rust,ignore
//! use ratebridge_fx::{ConversionOrchestrator, ConversionRequest, FxConfig, RequestContext};
//! use rust_decimal_macros::dec;
//!
//! let orchestrator = ConversionOrchestrator::from_config(&FxConfig::from_env())?;
//! let ctx = RequestContext::new();
//!
//! let rates = orchestrator.get_latest("USD", None, &ctx).await?;
//! let conversion = orchestrator
//!     .convert(&ConversionRequest::new("USD", "EUR", dec!(100)), &ctx)
//!     .await?;
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod factory;
pub mod frankfurter;
pub mod historical;
pub mod metrics;
pub mod provider;
pub mod retry;
pub mod secondary;
pub mod transport;
pub mod wire;

pub use cache::{CachedRateSource, RateCache, RateCacheConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::FxConfig;
pub use context::RequestContext;
pub use conversion::{Conversion, ConversionRequest};
pub use engine::{ConversionOrchestrator, HistoricalQuery, OrchestratorConfig, ProviderHealth};
pub use error::{FxError, FxResult};
pub use factory::{ProviderKind, RateSourceFactory};
pub use frankfurter::FrankfurterRateSource;
pub use historical::{HistoricalFetchConfig, HistoricalRangeFetcher};
pub use metrics::{MetricsSnapshot, ProviderMetrics};
pub use provider::RateSource;
pub use retry::RetryPolicy;
pub use secondary::SecondaryRateSource;
pub use transport::{HttpClient, ReqwestHttpClient, ResilientHttpTransport, UpstreamResponse};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
#[cfg(any(test, feature = "test-utils"))]
pub use transport::ScriptedHttpClient;
