//! HTTP error responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use ratebridge_common::CorrelationId;
use ratebridge_fx::FxError;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub correlation_id: CorrelationId,
}

/// An error ready to be written as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub correlation_id: CorrelationId,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            correlation_id,
            retry_after: None,
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>, id: CorrelationId) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message, id)
    }

    pub fn forbidden(id: CorrelationId) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Caller role is not permitted to use this endpoint",
            id,
        )
    }

    /// Map a provider layer error onto a status code.
    pub fn from_fx(err: FxError, id: CorrelationId) -> Self {
        let status = match &err {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            FxError::Upstream { .. } | FxError::Decode { .. } => StatusCode::BAD_GATEWAY,
            FxError::CircuitOpen { .. } | FxError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &err {
            FxError::Cancelled => warn!(correlation_id = %id, "Request cancelled before completion"),
            e if status.is_server_error() => {
                error!(correlation_id = %id, code = e.error_code(), error = %e, "Request failed")
            }
            _ => {}
        }

        let retry_after = match &err {
            FxError::CircuitOpen { retry_after, .. } => {
                Some(retry_after.unwrap_or(Duration::from_secs(1)))
            }
            _ => None,
        };

        Self {
            status,
            code: err.error_code(),
            message: err.to_string(),
            correlation_id: id,
            retry_after,
        }
    }

    pub fn from_query(rejection: QueryRejection, id: CorrelationId) -> Self {
        Self::bad_request("INVALID_QUERY", rejection.body_text(), id)
    }

    pub fn from_json(rejection: JsonRejection, id: CorrelationId) -> Self {
        Self::bad_request("INVALID_BODY", rejection.body_text(), id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: self.message,
            correlation_id: self.correlation_id,
        };
        let mut response = (self.status, Json(body)).into_response();

        if let Some(after) = self.retry_after {
            // Whole seconds, rounded up so clients never retry early.
            let secs = after.as_secs() + u64::from(after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratebridge_common::{CurrencyCode, CurrencyError};

    #[test]
    fn test_status_mapping() {
        let id = CorrelationId::new();
        let cases = [
            (FxError::Currency(CurrencyError::Disallowed(CurrencyCode::usd())), StatusCode::BAD_REQUEST),
            (FxError::UnknownProvider("ecb".into()), StatusCode::BAD_REQUEST),
            (
                FxError::Upstream { provider: "frankfurter".into(), status: Some(500), message: "boom".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                FxError::Decode { provider: "frankfurter".into(), message: "eof".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (FxError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (FxError::Configuration("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from_fx(err, id).status, status);
        }
    }

    #[test]
    fn test_circuit_open_sets_retry_after() {
        let err = FxError::CircuitOpen {
            provider: "frankfurter".into(),
            retry_after: Some(Duration::from_millis(12_300)),
        };
        let response = ApiError::from_fx(err, CorrelationId::new()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[RETRY_AFTER], "13");
    }
}
