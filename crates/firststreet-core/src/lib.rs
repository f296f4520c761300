//! # First Street Core
//!
//! Request-execution engine for the First Street Foundation API.
//!
//! ## Overview
//!
//! This crate fetches many independent resources concurrently and returns one
//! normalized result per request:
//!
//! - **Concurrent dispatch** under a per-host connection cap
//! - **Timeout retries** with a fixed backoff
//! - **Rate-limit bookkeeping** from `x-ratelimit-*` headers
//! - **Error taxonomy**: soft per-item failures as data, hard failures as errors
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`classify`] | Status and vendor error classification |
//! | [`config`] | Immutable client configuration |
//! | [`descriptor`] | Request descriptors and endpoint URLs |
//! | [`dispatcher`] | Batch fan-out, ordering and progress |
//! | [`error`] | Config and batch error types |
//! | [`executor`] | Single request execution and response interpretation |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`logging`] | Tracing subscriber setup |
//! | [`outcome`] | Per-request results |
//! | [`pool`] | Per-batch connection pool |
//! | [`rate_limit`] | Rate-limit snapshots |
//! | [`retry`] | Timeout retry policy |
//! | [`throttling`] | Optional client-side pacing |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use firststreet_core::{ClientConfig, Dispatcher, RequestDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     let descriptors = vec![
//!         RequestDescriptor::record(&config, "fema", "nfip", "property", 390000257i64, None),
//!         RequestDescriptor::tile(&config, "tile", "probability", (12, 942, 1539)),
//!     ];
//!
//!     let dispatcher = Dispatcher::new(config)?;
//!     for result in dispatcher.execute(descriptors, 50).await? {
//!         println!("{}", result.to_json());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Invalid identifiers and network failures come back as
//! [`ExecutionResult`] variants. Anything else aborts the batch:
//!
//! ```rust
//! use firststreet_core::{ApiErrorKind, BatchError};
//!
//! fn handle(error: BatchError) {
//!     match error.api_error().map(|e| e.kind()) {
//!         Some(ApiErrorKind::RateLimited) | Some(ApiErrorKind::Offline) => {
//!             // Back off and retry the batch later
//!         }
//!         Some(ApiErrorKind::Unauthorized) => {
//!             // Check the API key
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The API key is redacted from `Debug` output and error attachments
//! - Logs never contain the authorization header

pub mod classify;
pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod http_client;
pub mod logging;
pub mod outcome;
pub mod pool;
pub mod rate_limit;
pub mod retry;
pub mod throttling;

pub use classify::{
    classify, ApiError, ApiErrorKind, ErrorAttachments, RequestOptions, VendorError,
};
pub use config::{ApiKey, ClientConfig};
pub use descriptor::{ContextKey, RequestDescriptor, ResponseKind};
pub use dispatcher::{Dispatcher, NoProgress, ProgressSink, TracingProgress};
pub use error::{BatchError, ConfigError, CoreError};
pub use executor::RequestExecutor;
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient, ScriptedReply,
};
pub use logging::init_logging;
pub use outcome::{ExecutionResult, IdentifierKey};
pub use pool::{ConnectionPermit, ConnectionPool};
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
pub use retry::{RetryDecision, RetryPolicy};
pub use throttling::RequestThrottle;
