use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::ConfigError;

/// Outgoing GET request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response as seen by the executor: status, lowercase headers and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "application/vnd.api+json")
            .with_body(body.into().into_bytes())
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    /// Connect or read deadline elapsed.
    Timeout,
    /// Connection could not be established or was reset.
    Connect,
    /// Response body could not be read.
    Body,
    Other,
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn new(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Connect, message)
    }

    pub fn body(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Body, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Other, message)
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Only timeouts are worth another attempt.
    pub const fn retryable(&self) -> bool {
        matches!(self.kind, HttpErrorKind::Timeout)
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport contract used by the executor.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production transport backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .gzip(true)
            .pool_max_idle_per_host(config.connection_limit())
            .build()
            .map_err(|e| ConfigError::Transport(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url).timeout(request.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::connect(format!("connection failed: {e}"))
                } else {
                    HttpError::other(format!("request failed: {e}"))
                }
            })?;

            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_ascii_lowercase(), value.to_owned()))
                })
                .collect();

            let body = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("body read timeout: {e}"))
                } else {
                    HttpError::body(format!("failed to read response body: {e}"))
                }
            })?;

            Ok(HttpResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().map(String::from),
                headers,
                body: body.to_vec(),
            })
        })
    }
}

/// One canned transport outcome, optionally delayed.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    outcome: Result<HttpResponse, HttpError>,
    delay: Duration,
}

impl ScriptedReply {
    pub fn respond(response: HttpResponse) -> Self {
        Self {
            outcome: Ok(response),
            delay: Duration::ZERO,
        }
    }

    pub fn fail(error: HttpError) -> Self {
        Self {
            outcome: Err(error),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Offline transport that replays scripted replies per URL.
///
/// Replies for a URL are consumed in order; the last one repeats. It also
/// records every request and the peak number of concurrent calls.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
    fallback: Option<ScriptedReply>,
    requests: Mutex<Vec<HttpRequest>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: AtomicUsize,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, url: impl Into<String>, reply: ScriptedReply) -> Self {
        self.routes
            .lock()
            .expect("scripted routes lock should not be poisoned")
            .entry(url.into())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for URLs without a script.
    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("scripted requests lock should not be poisoned")
            .clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .expect("scripted requests lock should not be poisoned")
            .iter()
            .filter(|request| request.url == url)
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> Option<ScriptedReply> {
        let mut routes = self
            .routes
            .lock()
            .expect("scripted routes lock should not be poisoned");
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => self.fallback.clone(),
        }
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = InFlightGuard(Arc::clone(&self.in_flight));
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

            let reply = self.next_reply(&request.url);
            self.requests
                .lock()
                .expect("scripted requests lock should not be poisoned")
                .push(request.clone());

            let Some(reply) = reply else {
                return Err(HttpError::other(format!(
                    "no scripted reply for {}",
                    request.url
                )));
            };

            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            reply.outcome
        })
    }
}
