//! Correlation and request logging.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use ratebridge_common::{CorrelationId, CORRELATION_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, info_span, Instrument};

use crate::metrics::Metrics;

/// Correlation ID supplied by the client, if it is a valid UUID.
fn inbound_correlation_id(request: &Request) -> Option<CorrelationId> {
    request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| CorrelationId::parse(value).ok())
}

/// Active-request slot released on drop, so a request abandoned
/// mid-flight still leaves the active count.
struct InFlight {
    metrics: Arc<Metrics>,
    finished: bool,
}

impl InFlight {
    fn start(metrics: Arc<Metrics>) -> Self {
        metrics.request_started();
        Self {
            metrics,
            finished: false,
        }
    }

    fn finish(mut self, status: u16) {
        self.finished = true;
        self.metrics.request_finished(status);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            self.metrics.request_abandoned();
        }
    }
}

/// Assigns a correlation ID, logs entry and exit, and echoes the ID.
///
/// The ID is stored in request extensions for handlers and guards.
pub async fn correlate(
    State(metrics): State<Arc<Metrics>>,
    mut request: Request,
    next: Next,
) -> Response {
    let correlation_id = inbound_correlation_id(&request).unwrap_or_default();
    request.extensions_mut().insert(correlation_id);

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!("request", correlation_id = %correlation_id);
    let started = Instant::now();
    let in_flight = InFlight::start(metrics);

    let mut response = async {
        info!(%method, %path, %client, "Request received");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let status = response.status();
    in_flight.finish(status.as_u16());
    span.in_scope(|| {
        info!(
            %method,
            %path,
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
    });

    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
