//! Single-request executor.
//!
//! Performs one GET per descriptor, retries timeouts, and turns the response
//! into an [`ExecutionResult`]. Only unexpected statuses escape as
//! [`ApiError`]; every recoverable condition is returned as data.
//!
//! | Kind | Status | Outcome |
//! |------|--------|---------|
//! | Tile | 200 | `Tile` |
//! | Tile | 500 | `InvalidId` (coordinate) |
//! | Tile | other | `ApiError` |
//! | Record | 200/404/500 with `error` body | `InvalidId` |
//! | Record | 200/500 | `Record` |
//! | Record | bare 404 | `InvalidId` |
//! | Record | other | `ApiError` |

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::classify::{classify, ApiError, RequestOptions, VendorError};
use crate::config::ClientConfig;
use crate::descriptor::{RequestDescriptor, ResponseKind};
use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::outcome::{ExecutionResult, IdentifierKey};
use crate::pool::ConnectionPool;
use crate::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::retry::RetryDecision;
use crate::throttling::RequestThrottle;

#[derive(Clone)]
pub struct RequestExecutor {
    config: Arc<ClientConfig>,
    http_client: Arc<dyn HttpClient>,
    headers: BTreeMap<String, String>,
    throttle: Option<RequestThrottle>,
}

impl RequestExecutor {
    pub fn new(config: Arc<ClientConfig>, http_client: Arc<dyn HttpClient>) -> Self {
        let headers = config.default_headers();
        let throttle = config.requests_per_second().map(RequestThrottle::per_second);
        Self {
            config,
            http_client,
            headers,
            throttle,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches one descriptor through `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for statuses outside the expected set. Timeouts,
    /// transport failures and invalid ids are reported as `Ok` results.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        pool: &ConnectionPool,
        rate_limits: &RateLimitTracker,
    ) -> Result<ExecutionResult, ApiError> {
        let policy = self.config.retry();
        let mut attempt = 1u32;

        loop {
            let failure = match self.send(descriptor, pool).await {
                Ok(response) => return self.interpret(descriptor, response, rate_limits),
                Err(failure) => failure,
            };

            match policy.decide(attempt, &failure) {
                RetryDecision::RetryAfter(delay) => {
                    info!(
                        item = %descriptor.context_key,
                        url = %descriptor.url,
                        attempt,
                        "timeout error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::NoRetry => {
                    if failure.retryable() {
                        error!(
                            item = %descriptor.context_key,
                            url = %descriptor.url,
                            attempts = attempt,
                            "timeout error after exhausting retries"
                        );
                    } else {
                        error!(
                            item = %descriptor.context_key,
                            url = %descriptor.url,
                            kind = ?failure.kind(),
                            error = %failure,
                            "transport error"
                        );
                    }
                    return Ok(ExecutionResult::NetworkError {
                        context_key: descriptor.context_key.clone(),
                    });
                }
            }
        }
    }

    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        pool: &ConnectionPool,
    ) -> Result<HttpResponse, HttpError> {
        if let Some(throttle) = &self.throttle {
            throttle.until_ready().await;
        }
        let _permit = pool.acquire(descriptor.host()).await;

        let request = HttpRequest::get(&descriptor.url)
            .with_headers(&self.headers)
            .with_timeout(self.config.request_timeout());
        self.http_client.execute(request).await
    }

    fn interpret(
        &self,
        descriptor: &RequestDescriptor,
        response: HttpResponse,
        rate_limits: &RateLimitTracker,
    ) -> Result<ExecutionResult, ApiError> {
        let rate_limit = RateLimitSnapshot::from_response(&response);
        rate_limits.record(&rate_limit);
        debug!(
            url = %descriptor.url,
            status = response.status,
            limit = ?rate_limit.limit,
            remaining = ?rate_limit.remaining,
            reset = ?rate_limit.reset,
            request_id = ?rate_limit.request_id,
            "response received"
        );
        if rate_limit.is_exhausted() {
            warn!(reset = ?rate_limit.reset, "rate limit quota exhausted");
        }

        match descriptor.response_kind {
            ResponseKind::Tile => self.interpret_tile(descriptor, response, rate_limit),
            ResponseKind::Record => self.interpret_record(descriptor, response, rate_limit),
        }
    }

    fn interpret_tile(
        &self,
        descriptor: &RequestDescriptor,
        response: HttpResponse,
        rate_limit: RateLimitSnapshot,
    ) -> Result<ExecutionResult, ApiError> {
        match response.status {
            200 => Ok(ExecutionResult::Tile {
                context_key: descriptor.context_key.clone(),
                image: response.body,
            }),
            500 => {
                info!(
                    coordinate = %descriptor.context_key,
                    "error retrieving tile from server, check that the coordinates are correct"
                );
                Ok(self.invalid(descriptor))
            }
            _ => Err(self.hard_error(descriptor, &response, None, rate_limit)),
        }
    }

    fn interpret_record(
        &self,
        descriptor: &RequestDescriptor,
        response: HttpResponse,
        rate_limit: RateLimitSnapshot,
    ) -> Result<ExecutionResult, ApiError> {
        let body = serde_json::from_slice::<Value>(&response.body).ok();
        let vendor = body.as_ref().and_then(VendorError::from_body);

        if !matches!(response.status, 200 | 404 | 500) {
            return Err(self.hard_error(descriptor, &response, vendor.as_ref(), rate_limit));
        }
        if vendor.is_some() {
            return Ok(self.invalid(descriptor));
        }

        match (response.status, body) {
            (404, _) => Ok(self.invalid(descriptor)),
            (_, Some(body)) => Ok(ExecutionResult::Record {
                context_key: descriptor.context_key.clone(),
                body,
            }),
            (_, None) => {
                error!(
                    item = %descriptor.context_key,
                    url = %descriptor.url,
                    "response body is not valid json"
                );
                Ok(ExecutionResult::NetworkError {
                    context_key: descriptor.context_key.clone(),
                })
            }
        }
    }

    fn invalid(&self, descriptor: &RequestDescriptor) -> ExecutionResult {
        ExecutionResult::InvalidId {
            context_key: descriptor.context_key.clone(),
            key: IdentifierKey::for_kind(
                descriptor.response_kind,
                &descriptor.product_family,
                &descriptor.product_subtype,
            ),
        }
    }

    fn hard_error(
        &self,
        descriptor: &RequestDescriptor,
        response: &HttpResponse,
        vendor: Option<&VendorError>,
        rate_limit: RateLimitSnapshot,
    ) -> ApiError {
        let options = RequestOptions::new(&descriptor.url, &self.headers);
        let error = classify(
            response.status,
            response.reason.as_deref(),
            vendor,
            rate_limit,
            options,
        );
        warn!(
            item = %descriptor.context_key,
            url = %descriptor.url,
            code = error.code(),
            "{}",
            error.message()
        );
        error
    }
}
