//! Rate-limit headers returned by the API.

use std::fmt::{Display, Formatter};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::http_client::HttpResponse;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Parsed view of the rate-limit headers of one response.
///
/// Fields are `None` when the server omitted the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSnapshot {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<String>,
    pub request_id: Option<String>,
}

impl RateLimitSnapshot {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self::from_lookup(|name| response.header(name))
    }

    pub fn from_lookup<'a, F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let number = |name: &str| lookup(name).and_then(|value| value.trim().parse::<u64>().ok());
        let text = |name: &str| lookup(name).map(|value| value.trim().to_owned());

        Self {
            limit: number(HEADER_LIMIT),
            remaining: number(HEADER_REMAINING),
            reset: text(HEADER_RESET),
            request_id: text(HEADER_REQUEST_ID),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none()
            && self.remaining.is_none()
            && self.reset.is_none()
            && self.request_id.is_none()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Reset instant, when the header holds unix seconds or an RFC 3339 timestamp.
    pub fn reset_at(&self) -> Option<OffsetDateTime> {
        let raw = self.reset.as_deref()?;
        if let Ok(seconds) = raw.parse::<i64>() {
            return OffsetDateTime::from_unix_timestamp(seconds).ok();
        }
        OffsetDateTime::parse(raw, &Rfc3339).ok()
    }
}

impl Display for RateLimitSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Limit: {}. Remaining: {}. Reset: {}",
            display_or_unknown(self.limit.as_ref()),
            display_or_unknown(self.remaining.as_ref()),
            display_or_unknown(self.reset.as_ref()),
        )
    }
}

fn display_or_unknown<T: Display>(value: Option<&T>) -> String {
    value.map_or_else(|| String::from("unknown"), ToString::to_string)
}

/// Most recent snapshot observed during one batch.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    latest: Mutex<Option<RateLimitSnapshot>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `snapshot` unless it carries no rate-limit information.
    pub fn record(&self, snapshot: &RateLimitSnapshot) {
        if snapshot.is_empty() {
            return;
        }
        let mut latest = self
            .latest
            .lock()
            .expect("rate limit tracker lock should not be poisoned");
        *latest = Some(snapshot.clone());
    }

    pub fn latest(&self) -> Option<RateLimitSnapshot> {
        self.latest
            .lock()
            .expect("rate limit tracker lock should not be poisoned")
            .clone()
    }
}
