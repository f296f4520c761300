//! Concurrent dispatcher.
//!
//! Fans a batch of descriptors out to the [`RequestExecutor`], one tokio task
//! per descriptor, under a fresh [`ConnectionPool`]. Results are written to a
//! positional slot so the output order matches the input order whatever the
//! completion order. The first hard error aborts every task still running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::{BatchError, ConfigError};
use crate::executor::RequestExecutor;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::outcome::ExecutionResult;
use crate::pool::ConnectionPool;
use crate::rate_limit::{RateLimitSnapshot, RateLimitTracker};

/// Receives coarse batch progress as tasks finish.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

/// Logs progress at info every tenth of the batch and at completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        let step = (total / 10).max(1);
        if completed == total || completed % step == 0 {
            info!(completed, total, "batch progress");
        } else {
            debug!(completed, total, "batch progress");
        }
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

pub struct Dispatcher {
    executor: Arc<RequestExecutor>,
    progress: Arc<dyn ProgressSink>,
    last_rate_limit: Mutex<Option<RateLimitSnapshot>>,
}

impl Dispatcher {
    /// Dispatcher backed by a reqwest transport.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let http_client = ReqwestHttpClient::new(&config)?;
        Ok(Self::with_http_client(config, Arc::new(http_client)))
    }

    pub fn with_http_client(config: ClientConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            executor: Arc::new(RequestExecutor::new(Arc::new(config), http_client)),
            progress: Arc::new(TracingProgress),
            last_rate_limit: Mutex::new(None),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        self.executor.config()
    }

    /// Most recent rate-limit snapshot seen by the last batch.
    pub fn last_rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.last_rate_limit
            .lock()
            .expect("dispatcher rate limit lock should not be poisoned")
            .clone()
    }

    /// Runs the batch with the configured connection limit.
    pub async fn execute_default(
        &self,
        descriptors: Vec<RequestDescriptor>,
    ) -> Result<Vec<ExecutionResult>, BatchError> {
        let limit = self.config().connection_limit();
        self.execute(descriptors, limit).await
    }

    /// Runs every descriptor with at most `limit` simultaneous connections per host.
    ///
    /// Returns one result per descriptor, in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Api`] on the first classified error; remaining
    /// requests are aborted. [`BatchError::TaskFailed`] reports a panicked task.
    pub async fn execute(
        &self,
        descriptors: Vec<RequestDescriptor>,
        limit: usize,
    ) -> Result<Vec<ExecutionResult>, BatchError> {
        let total = descriptors.len();
        let pool = Arc::new(ConnectionPool::new(limit));
        let tracker = Arc::new(RateLimitTracker::new());
        info!(total, limit = pool.limit_per_host(), "dispatching batch");

        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::with_capacity(total);
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let pool = Arc::clone(&pool);
            let tracker = Arc::clone(&tracker);
            let handle = tasks.spawn(async move {
                let result = executor.execute(&descriptor, &pool, &tracker).await;
                (index, result)
            });
            task_index.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<ExecutionResult>> = (0..total).map(|_| None).collect();
        let mut completed = 0usize;
        let mut failure = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(result))) => {
                    slots[index] = Some(result);
                    completed += 1;
                    self.progress.on_progress(completed, total);
                }
                Ok((index, Err(error))) => {
                    warn!(index, code = error.code(), "aborting batch on classified error");
                    failure = Some(BatchError::Api(error));
                    break;
                }
                Err(join_error) => {
                    let index = task_index.get(&join_error.id()).copied();
                    warn!(?index, error = %join_error, "aborting batch on failed task");
                    failure = Some(BatchError::TaskFailed {
                        index,
                        reason: join_error.to_string(),
                    });
                    break;
                }
            }
        }

        tasks.shutdown().await;
        *self
            .last_rate_limit
            .lock()
            .expect("dispatcher rate limit lock should not be poisoned") = tracker.latest();
        drop(pool);

        if let Some(failure) = failure {
            return Err(failure);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| BatchError::TaskFailed {
                    index: Some(index),
                    reason: String::from("request finished without a result"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use std::future::Future;
    use std::pin::Pin;

    use super::*;
    use crate::descriptor::ResponseKind;
    use crate::http_client::{
        HttpError, HttpRequest, HttpResponse, ScriptedHttpClient, ScriptedReply,
    };

    /// Panics for one URL, answers `{}` for the rest.
    struct PanickingHttpClient {
        panic_url: String,
    }

    impl HttpClient for PanickingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async move {
                assert_ne!(request.url, self.panic_url, "transport crashed");
                Ok(HttpResponse::json(200, "{}"))
            })
        }
    }

    #[derive(Default)]
    struct CountingProgress {
        calls: AtomicUsize,
        last: Mutex<(usize, usize)>,
    }

    impl ProgressSink for CountingProgress {
        fn on_progress(&self, completed: usize, total: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().expect("lock") = (completed, total);
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("k").expect("valid key")
    }

    #[tokio::test]
    async fn empty_batch_returns_empty_results() {
        let dispatcher =
            Dispatcher::with_http_client(config(), Arc::new(ScriptedHttpClient::new()));
        let results = dispatcher.execute(Vec::new(), 10).await.expect("empty batch");
        assert!(results.is_empty());
        assert_eq!(dispatcher.last_rate_limit(), None);
    }

    #[tokio::test]
    async fn progress_is_reported_per_completion() {
        let client = ScriptedHttpClient::new()
            .with_fallback(ScriptedReply::respond(HttpResponse::json(200, "{}")));
        let progress = Arc::new(CountingProgress::default());
        let dispatcher = Dispatcher::with_http_client(config(), Arc::new(client))
            .with_progress(progress.clone());

        let descriptors = (0..4i64)
            .map(|id| {
                RequestDescriptor::new(
                    format!("https://api.example/{id}"),
                    id,
                    ResponseKind::Record,
                    "fema",
                    "nfip",
                )
            })
            .collect();
        let results = dispatcher.execute_default(descriptors).await.expect("batch");

        assert_eq!(results.len(), 4);
        assert_eq!(progress.calls.load(Ordering::SeqCst), 4);
        assert_eq!(*progress.last.lock().expect("lock"), (4, 4));
    }

    #[tokio::test]
    async fn panicked_task_reports_its_descriptor_index() {
        let client = PanickingHttpClient {
            panic_url: String::from("https://api.example/2"),
        };
        let dispatcher = Dispatcher::with_http_client(config(), Arc::new(client))
            .with_progress(Arc::new(NoProgress));

        let descriptors = (0..4i64)
            .map(|id| {
                RequestDescriptor::new(
                    format!("https://api.example/{id}"),
                    id,
                    ResponseKind::Record,
                    "fema",
                    "nfip",
                )
            })
            .collect();
        let error = dispatcher
            .execute(descriptors, 4)
            .await
            .expect_err("panicked task fails the batch");

        match error {
            BatchError::TaskFailed { index, .. } => assert_eq!(index, Some(2)),
            other => panic!("expected task failure, got {other:?}"),
        }
    }

    #[test]
    fn tracing_progress_accepts_any_counts() {
        TracingProgress.on_progress(0, 0);
        TracingProgress.on_progress(3, 25);
        NoProgress.on_progress(1, 1);
    }
}
