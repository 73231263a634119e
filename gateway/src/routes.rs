//! Currency endpoints under `/api/currency`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use ratebridge_common::{parse_date, CorrelationId, HistoricalPage, RateTable};
use ratebridge_fx::{
    Conversion, ConversionRequest, HistoricalQuery, ProviderHealth, RequestContext,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::DropGuard;

use crate::auth::{require_role, AccessPolicy};
use crate::error::ApiError;
use crate::metrics::MetricsSnapshot;
use crate::middleware::correlate;
use crate::state::AppState;

/// Prefix every currency route is mounted under.
pub const API_PREFIX: &str = "/api/currency";

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    let admin = AccessPolicy::new(&state, AccessPolicy::ADMIN);
    let user_or_admin = AccessPolicy::new(&state, AccessPolicy::USER_OR_ADMIN);

    let api = Router::new()
        .route(
            "/latest",
            get(latest).layer(from_fn_with_state(admin.clone(), require_role)),
        )
        .route(
            "/convert",
            post(convert).layer(from_fn_with_state(user_or_admin, require_role)),
        )
        .route(
            "/historical",
            get(historical).layer(from_fn_with_state(admin, require_role)),
        )
        .route("/health", get(health));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(from_fn_with_state(state.metrics.clone(), correlate))
        .with_state(state)
}

/// Context whose token is cancelled when the guard drops. A client
/// disconnect drops the handler future, and with it the guard.
fn request_context(correlation_id: CorrelationId) -> (RequestContext, DropGuard) {
    let ctx = RequestContext::with_correlation_id(correlation_id);
    let guard = ctx.cancellation().clone().drop_guard();
    (ctx, guard)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestParams {
    pub base_currency: String,
    pub provider: Option<String>,
}

async fn latest(
    State(state): State<AppState>,
    Extension(id): Extension<CorrelationId>,
    params: Result<Query<LatestParams>, QueryRejection>,
) -> Result<Json<RateTable>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::from_query(e, id))?;
    let (ctx, _guard) = request_context(id);

    let result = state
        .orchestrator
        .get_latest(&params.base_currency, params.provider.as_deref(), &ctx)
        .await;

    result.map(Json).map_err(|e| ApiError::from_fx(e, id))
}

async fn convert(
    State(state): State<AppState>,
    Extension(id): Extension<CorrelationId>,
    body: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Json<Conversion>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::from_json(e, id))?;
    let (ctx, _guard) = request_context(id);

    let result = state.orchestrator.convert(&request, &ctx).await;

    result.map(Json).map_err(|e| ApiError::from_fx(e, id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalParams {
    pub base_currency: String,
    pub start_date: String,
    pub end_date: String,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub provider: Option<String>,
}

impl HistoricalParams {
    fn into_query(self, id: CorrelationId) -> Result<HistoricalQuery, ApiError> {
        let date = |field: &str, raw: &str| {
            parse_date(raw).map_err(|_| {
                ApiError::bad_request(
                    "INVALID_DATE",
                    format!("{field} must be a yyyy-MM-dd date, got '{raw}'"),
                    id,
                )
            })
        };
        let start = date("startDate", &self.start_date)?;
        let end = date("endDate", &self.end_date)?;

        let mut query = HistoricalQuery::new(self.base_currency, start, end)
            .with_page(self.page.unwrap_or(1), self.page_size.unwrap_or(10));
        if let Some(provider) = self.provider {
            query = query.with_provider(provider);
        }
        Ok(query)
    }
}

async fn historical(
    State(state): State<AppState>,
    Extension(id): Extension<CorrelationId>,
    params: Result<Query<HistoricalParams>, QueryRejection>,
) -> Result<Json<HistoricalPage>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::from_query(e, id))?;
    let query = params.into_query(id)?;
    let (ctx, _guard) = request_context(id);

    let result = state.orchestrator.get_historical(&query, &ctx).await;

    result.map(Json).map_err(|e| ApiError::from_fx(e, id))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` when every provider accepts calls, `degraded` otherwise.
    pub status: &'static str,
    pub providers: Vec<ProviderHealth>,
    pub requests: MetricsSnapshot,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers = state.orchestrator.health();
    let status = if providers.iter().all(ProviderHealth::is_available) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        providers,
        requests: state.metrics.snapshot(),
    })
}
