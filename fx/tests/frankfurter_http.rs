//! Frankfurter source over real HTTP against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use ratebridge_common::{CurrencyCode, CORRELATION_ID_HEADER};
use ratebridge_fx::{
    CircuitBreakerConfig, CircuitState, FrankfurterRateSource, FxError, ProviderMetrics,
    RateSource, RequestContext, ReqwestHttpClient, ResilientHttpTransport, RetryPolicy,
};
use rust_decimal_macros::dec;

fn source(base_url: &str, retry: RetryPolicy) -> FrankfurterRateSource {
    let client = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
    let transport = ResilientHttpTransport::new(
        FrankfurterRateSource::NAME,
        Arc::new(client),
        retry,
        CircuitBreakerConfig::default(),
        Arc::new(ProviderMetrics::new()),
    );
    FrankfurterRateSource::new(base_url, Arc::new(transport))
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        unit_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_get_rate_sends_correlation_header() {
    let mut server = mockito::Server::new_async().await;
    let ctx = RequestContext::new();

    let mock = server
        .mock("GET", "/latest")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("base".into(), "USD".into()),
            Matcher::UrlEncoded("symbols".into(), "EUR".into()),
        ]))
        .match_header(CORRELATION_ID_HEADER, ctx.correlation_id().to_string().as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"amount":1.0,"base":"USD","date":"2024-03-01","rates":{"EUR":0.9}}"#)
        .create_async()
        .await;

    let rate = source(&server.url(), RetryPolicy::none())
        .get_rate(&CurrencyCode::usd(), &CurrencyCode::eur(), &ctx)
        .await
        .unwrap();

    assert_eq!(rate, Some(dec!(0.9)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_dated_table() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/2024-01-05")
        .match_query(Matcher::UrlEncoded("base".into(), "EUR".into()))
        .with_status(200)
        .with_body(r#"{"base":"EUR","date":"2024-01-05","rates":{"GBP":0.86,"USD":1.09}}"#)
        .create_async()
        .await;

    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let table = source(&server.url(), RetryPolicy::none())
        .get_table_for_date(&CurrencyCode::eur(), date, &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.get(&CurrencyCode::usd()), Some(dec!(1.09)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/latest")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let source = source(&server.url(), fast_retries(2));
    let err = source
        .get_latest_table(&CurrencyCode::usd(), &RequestContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FxError::Upstream { status: Some(503), .. }));
    assert_eq!(source.circuit_state(), Some(CircuitState::Closed));
    assert_eq!(source.metrics().unwrap().upstream_retries, 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/latest")
        .match_query(Matcher::Any)
        .with_status(422)
        .with_body(r#"{"message":"not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = source(&server.url(), fast_retries(6))
        .get_latest_table(&CurrencyCode::usd(), &RequestContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FxError::Upstream { status: Some(422), .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host_is_upstream_error() {
    // Nothing listens on port 9 of localhost in test environments.
    let err = source("http://127.0.0.1:9", RetryPolicy::none())
        .get_latest_table(&CurrencyCode::usd(), &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FxError::Upstream { status: None, .. }));
}
