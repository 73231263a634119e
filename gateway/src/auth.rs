//! Role-based access to the currency endpoints.
//!
//! Authentication happens in front of the gateway. The fronting layer
//! asserts the caller's roles in a trusted header, which may carry a
//! comma-separated list.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ratebridge_common::CorrelationId;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::state::AppState;

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(UnknownRole(s.trim().to_string())),
        }
    }
}

/// Roles asserted in `header`. Unrecognized entries are ignored.
pub fn roles_from_headers(headers: &HeaderMap, header: &HeaderName) -> Vec<Role> {
    headers
        .get_all(header)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|role| role.parse().ok())
        .collect()
}

/// Roles allowed through one route.
#[derive(Clone)]
pub struct AccessPolicy {
    header: HeaderName,
    allowed: &'static [Role],
    metrics: Arc<Metrics>,
}

impl AccessPolicy {
    pub const ADMIN: &'static [Role] = &[Role::Admin];
    pub const USER_OR_ADMIN: &'static [Role] = &[Role::User, Role::Admin];

    pub fn new(state: &AppState, allowed: &'static [Role]) -> Self {
        Self {
            header: state.role_header.clone(),
            allowed,
            metrics: state.metrics.clone(),
        }
    }

    pub fn admits(&self, headers: &HeaderMap) -> bool {
        roles_from_headers(headers, &self.header)
            .iter()
            .any(|role| self.allowed.contains(role))
    }
}

/// Middleware rejecting callers without an allowed role with 403.
pub async fn require_role(
    State(policy): State<AccessPolicy>,
    request: Request,
    next: Next,
) -> Response {
    if policy.admits(request.headers()) {
        return next.run(request).await;
    }

    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .copied()
        .unwrap_or_default();
    policy.metrics.request_forbidden();
    warn!(
        correlation_id = %correlation_id,
        path = %request.uri().path(),
        "Caller lacks required role"
    );
    ApiError::forbidden(correlation_id).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" user ".parse::<Role>(), Ok(Role::User));
        assert_eq!("root".parse::<Role>(), Err(UnknownRole("root".to_string())));
    }

    #[test]
    fn test_roles_from_headers() {
        let header = HeaderName::from_static("x-authenticated-role");
        let mut headers = HeaderMap::new();
        headers.insert(&header, HeaderValue::from_static("Auditor, user"));
        headers.append(&header, HeaderValue::from_static("Admin"));

        assert_eq!(roles_from_headers(&headers, &header), vec![Role::User, Role::Admin]);
        assert!(roles_from_headers(&HeaderMap::new(), &header).is_empty());
    }
}
