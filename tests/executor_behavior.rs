//! Behavior tests for single-request execution against scripted responses.

use std::sync::Arc;

use firststreet_core::{
    ApiErrorKind, ConnectionPool, ContextKey, ExecutionResult, HttpError, HttpResponse,
    IdentifierKey, RateLimitTracker, RequestDescriptor, RequestExecutor, ScriptedHttpClient,
    ScriptedReply,
};
use firststreet_tests::test_config as config;
use serde_json::json;


fn executor(client: ScriptedHttpClient) -> (RequestExecutor, Arc<ScriptedHttpClient>) {
    let client = Arc::new(client);
    let executor = RequestExecutor::new(Arc::new(config()), client.clone());
    (executor, client)
}

async fn run(
    executor: &RequestExecutor,
    descriptor: &RequestDescriptor,
) -> Result<ExecutionResult, firststreet_core::ApiError> {
    let pool = ConnectionPool::new(4);
    let tracker = RateLimitTracker::new();
    executor.execute(descriptor, &pool, &tracker).await
}

fn record(family: &str, subtype: &str, item: i64) -> RequestDescriptor {
    RequestDescriptor::record(&config(), family, subtype, "property", item, None)
}

// =============================================================================
// Records
// =============================================================================

#[tokio::test]
async fn when_record_exists_system_returns_decoded_body() {
    // Given: a property lookup that answers with JSON
    let descriptor = record("fema", "nfip", 390000257);
    let (executor, client) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::respond(HttpResponse::json(200, r#"{"fsid": 390000257, "claimCount": 2}"#)),
    ));

    // When: the request is executed
    let result = run(&executor, &descriptor).await.expect("success");

    // Then: the body is returned and the request carried the api headers
    assert_eq!(result.record(), Some(&json!({"fsid": 390000257, "claimCount": 2})));
    let sent = &client.requests()[0];
    assert_eq!(
        sent.headers.get("authorization").map(String::as_str),
        Some("Bearer test-key")
    );
    assert_eq!(
        sent.headers.get("accept").map(String::as_str),
        Some("application/vnd.api+json")
    );
}

#[tokio::test]
async fn when_vendor_reports_error_system_returns_invalid_id_with_product_key() {
    let cases = [
        ("fema", "nfip", IdentifierKey::Fsid),
        ("adaptation", "detail", IdentifierKey::AdaptationId),
        ("historic", "event", IdentifierKey::EventId),
    ];

    for (family, subtype, key) in cases {
        // Given: a 404 whose body names the failure
        let descriptor = record(family, subtype, 7);
        let (executor, _) = executor(ScriptedHttpClient::new().with_reply(
            &descriptor.url,
            ScriptedReply::respond(HttpResponse::json(
                404,
                r#"{"error": {"code": 404, "message": "Not Found"}}"#,
            )),
        ));

        // When / Then: the identifier is echoed under the product's key
        let result = run(&executor, &descriptor).await.expect("soft failure");
        assert_eq!(
            result,
            ExecutionResult::InvalidId {
                context_key: ContextKey::from(7i64),
                key,
            }
        );
        assert_eq!(result.to_json(), json!({ key.as_str(): 7, "valid": false }));
    }
}

#[tokio::test]
async fn when_record_is_missing_without_error_body_system_returns_invalid_id() {
    let descriptor = record("fema", "nfip", 1);
    let (executor, _) = executor(
        ScriptedHttpClient::new()
            .with_reply(&descriptor.url, ScriptedReply::respond(HttpResponse::new(404))),
    );

    let result = run(&executor, &descriptor).await.expect("soft failure");
    assert!(!result.is_valid());
}

#[tokio::test]
async fn when_server_fails_without_error_body_system_returns_decoded_body() {
    // Given: a 500 whose JSON body carries no error field
    let descriptor = record("fema", "nfip", 1);
    let (executor, _) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::respond(HttpResponse::json(500, r#"{"fsid": 1, "detail": "partial"}"#)),
    ));

    // When / Then: the body is returned as a record
    let result = run(&executor, &descriptor).await.expect("soft outcome");
    assert_eq!(result.record(), Some(&json!({"fsid": 1, "detail": "partial"})));
}

#[tokio::test]
async fn when_error_field_is_empty_system_returns_record() {
    let descriptor = record("fema", "nfip", 0);
    let (executor, _) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::respond(HttpResponse::json(200, r#"{"fsid": 0, "error": {}}"#)),
    ));

    let result = run(&executor, &descriptor).await.expect("success");
    assert!(result.is_success());
    assert!(result.is_valid());
}

#[tokio::test]
async fn when_body_is_not_json_system_returns_network_error() {
    let descriptor = record("fema", "nfip", 3);
    let (executor, _) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::respond(HttpResponse::new(200).with_body("<html>")),
    ));

    let result = run(&executor, &descriptor).await.expect("soft failure");
    assert_eq!(result.to_json(), json!({"search_item": 3}));
}

#[tokio::test]
async fn when_status_is_unexpected_system_raises_unknown_error() {
    let descriptor = record("fema", "nfip", 1);
    let (executor, _) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::respond(HttpResponse::json(418, "{}").with_reason("I'm a teapot")),
    ));

    let error = run(&executor, &descriptor).await.expect_err("hard failure");
    assert_eq!(error.kind(), ApiErrorKind::Unknown);
    assert_eq!(error.status(), 418);
    assert!(!error.retryable());
}

#[tokio::test]
async fn when_rate_limited_system_raises_error_with_quota_numbers() {
    // Given: a 429 with rate-limit headers
    let descriptor = record("fema", "nfip", 1);
    let response = HttpResponse::json(429, "{}")
        .with_reason("Too Many Requests")
        .with_header("x-ratelimit-limit", "5000")
        .with_header("x-ratelimit-remaining", "0")
        .with_header("x-ratelimit-reset", "1700000000");
    let (executor, _) = executor(
        ScriptedHttpClient::new().with_reply(&descriptor.url, ScriptedReply::respond(response)),
    );

    // When: the request is executed
    let error = run(&executor, &descriptor).await.expect_err("hard failure");

    // Then: the message carries the quota and the snapshot is attached
    assert_eq!(error.kind(), ApiErrorKind::RateLimited);
    assert!(error.retryable());
    assert!(error.message().contains("5000"));
    assert!(error.message().contains("Remaining: 0"));
    assert!(error.message().contains("1700000000"));
    assert_eq!(error.rate_limit().remaining, Some(0));
}

// =============================================================================
// Tiles
// =============================================================================

#[tokio::test]
async fn when_tile_exists_system_returns_image_bytes() {
    let descriptor = RequestDescriptor::tile(&config(), "tile", "probability", (12, 942, 1539));
    let png = vec![0x89, b'P', b'N', b'G'];
    let (executor, _) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::respond(HttpResponse::new(200).with_body(png.clone())),
    ));

    let result = run(&executor, &descriptor).await.expect("success");
    assert_eq!(result.image(), Some(png.as_slice()));
    assert_eq!(result.context_key(), &ContextKey::from((12u32, 942, 1539)));
}

#[tokio::test]
async fn when_tile_is_outside_coverage_system_returns_invalid_coordinate() {
    let descriptor = RequestDescriptor::tile(&config(), "tile", "probability", (1, 2, 3));
    let (executor, _) = executor(
        ScriptedHttpClient::new()
            .with_reply(&descriptor.url, ScriptedReply::respond(HttpResponse::new(500))),
    );

    let result = run(&executor, &descriptor).await.expect("soft failure");
    assert_eq!(
        result.to_json(),
        json!({"coordinate": [1, 2, 3], "image": null, "valid": false})
    );
}

#[tokio::test]
async fn when_tile_request_is_unauthorized_system_raises_error() {
    let descriptor = RequestDescriptor::tile(&config(), "tile", "probability", (1, 2, 3));
    let (executor, _) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::respond(HttpResponse::new(401).with_reason("Unauthorized")),
    ));

    let error = run(&executor, &descriptor).await.expect_err("hard failure");
    assert_eq!(error.kind(), ApiErrorKind::Unauthorized);
    assert_eq!(error.status(), 401);
}

// =============================================================================
// Retries
// =============================================================================

#[tokio::test]
async fn when_timeout_clears_on_third_attempt_system_returns_result() {
    let descriptor = record("fema", "nfip", 5);
    let (executor, client) = executor(
        ScriptedHttpClient::new()
            .with_reply(&descriptor.url, ScriptedReply::fail(HttpError::timeout("slow")))
            .with_reply(&descriptor.url, ScriptedReply::fail(HttpError::timeout("slow")))
            .with_reply(
                &descriptor.url,
                ScriptedReply::respond(HttpResponse::json(200, r#"{"fsid": 5}"#)),
            ),
    );

    let result = run(&executor, &descriptor).await.expect("success");
    assert!(result.is_success());
    assert_eq!(client.calls_for(&descriptor.url), 3);
}

#[tokio::test]
async fn when_connection_fails_system_does_not_retry() {
    let descriptor = record("fema", "nfip", 5);
    let (executor, client) = executor(ScriptedHttpClient::new().with_reply(
        &descriptor.url,
        ScriptedReply::fail(HttpError::connect("connection refused")),
    ));

    let result = run(&executor, &descriptor).await.expect("soft failure");
    assert_eq!(
        result,
        ExecutionResult::NetworkError {
            context_key: ContextKey::from(5i64)
        }
    );
    assert_eq!(client.calls_for(&descriptor.url), 1);
}
