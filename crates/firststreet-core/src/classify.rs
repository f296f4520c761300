//! Classification of unexpected responses into typed, batch-fatal errors.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::Value;

use crate::rate_limit::RateLimitSnapshot;

/// Hard-failure category, fixed by status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    Unauthorized,
    NotAcceptable,
    RateLimited,
    Internal,
    Offline,
    Unknown,
}

impl ApiErrorKind {
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            406 => Self::NotAcceptable,
            429 => Self::RateLimited,
            500 => Self::Internal,
            503 => Self::Offline,
            _ => Self::Unknown,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Unauthorized => "api.unauthorized",
            Self::NotAcceptable => "api.not_acceptable",
            Self::RateLimited => "api.rate_limited",
            Self::Internal => "api.internal",
            Self::Offline => "api.offline",
            Self::Unknown => "api.unknown",
        }
    }
}

/// `error` object carried in a vendor response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorError {
    pub code: Option<u16>,
    pub message: Option<String>,
}

impl VendorError {
    /// Extracts the `error` field of a decoded body, if it is set.
    ///
    /// Empty and zero values (`null`, `false`, `0`, `""`, `[]`, `{}`) count as unset.
    pub fn from_body(body: &Value) -> Option<Self> {
        match body.get("error")? {
            Value::Null | Value::Bool(false) => None,
            Value::Number(number) if number.as_f64() == Some(0.0) => None,
            Value::String(text) if text.is_empty() => None,
            Value::Array(items) if items.is_empty() => None,
            Value::Object(fields) if fields.is_empty() => None,
            Value::String(text) => Some(Self {
                code: None,
                message: Some(text.clone()),
            }),
            Value::Object(fields) => Some(Self {
                code: fields.get("code").and_then(parse_code),
                message: fields.get("message").map(|message| match message {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                }),
            }),
            _ => Some(Self::default()),
        }
    }
}

fn parse_code(value: &Value) -> Option<u16> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|code| u16::try_from(code).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Request details attached to an error for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestOptions {
    pub url: String,
    /// Outbound headers with the authorization value redacted.
    pub headers: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn new(url: impl Into<String>, headers: &BTreeMap<String, String>) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.clone(), String::from("Bearer ***"))
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect();
        Self {
            url: url.into(),
            headers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorAttachments {
    pub options: RequestOptions,
    pub rate_limit: RateLimitSnapshot,
}

/// Classified, batch-fatal API error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ApiErrorKind,
    status: u16,
    message: String,
    attachments: ErrorAttachments,
}

impl ApiError {
    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// Effective status: the vendor code when one was supplied, else the HTTP status.
    pub const fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn attachments(&self) -> &ErrorAttachments {
        &self.attachments
    }

    pub fn rate_limit(&self) -> &RateLimitSnapshot {
        &self.attachments.rate_limit
    }

    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Whether retrying the whole batch later can succeed.
    pub const fn retryable(&self) -> bool {
        matches!(self.kind, ApiErrorKind::RateLimited | ApiErrorKind::Offline)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ApiError {}

/// Builds the error for an unexpected response.
///
/// A vendor error's code and message take precedence over the HTTP status
/// and reason phrase. 429 messages embed the rate-limit numbers.
pub fn classify(
    status: u16,
    reason: Option<&str>,
    vendor: Option<&VendorError>,
    rate_limit: RateLimitSnapshot,
    options: RequestOptions,
) -> ApiError {
    let status = vendor.and_then(|error| error.code).unwrap_or(status);
    let message = vendor
        .and_then(|error| error.message.as_deref())
        .or(reason)
        .unwrap_or("Unknown");

    let kind = ApiErrorKind::from_status(status);
    let formatted = match kind {
        ApiErrorKind::RateLimited => format!("Network Error {status}: {message}. {rate_limit}"),
        _ => format!("Network Error {status}: {message}"),
    };

    ApiError {
        kind,
        status,
        message: formatted,
        attachments: ErrorAttachments {
            options,
            rate_limit,
        },
    }
}
