//! Request descriptors: one per resource to fetch.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;

/// Caller-supplied identifier echoed back on every result.
///
/// It is opaque to the engine; typical values are a FSID, an address string,
/// a `(lat, lng)` pair or a `(z, x, y)` tile coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(Value);

impl ContextKey {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Rendering used inside URL paths and log lines.
    pub fn as_path_segment(&self) -> String {
        match &self.0 {
            Value::String(text) => text.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        }
    }
}

impl Display for ContextKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_path_segment())
    }
}

impl From<i64> for ContextKey {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<u64> for ContextKey {
    fn from(value: u64) -> Self {
        Self(Value::from(value))
    }
}

impl From<&str> for ContextKey {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for ContextKey {
    fn from(value: String) -> Self {
        Self(Value::from(value))
    }
}

impl From<(f64, f64)> for ContextKey {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self(Value::from(vec![lat, lng]))
    }
}

impl From<(u32, u32, u32)> for ContextKey {
    fn from((z, x, y): (u32, u32, u32)) -> Self {
        Self(Value::from(vec![z, x, y]))
    }
}

/// How the response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// JSON record.
    Record,
    /// Binary image tile.
    Tile,
}

/// Immutable description of one resource to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub url: String,
    pub context_key: ContextKey,
    pub response_kind: ResponseKind,
    pub product_family: String,
    pub product_subtype: String,
}

impl RequestDescriptor {
    pub fn new(
        url: impl Into<String>,
        context_key: impl Into<ContextKey>,
        response_kind: ResponseKind,
        product_family: impl Into<String>,
        product_subtype: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            context_key: context_key.into(),
            response_kind,
            product_family: product_family.into(),
            product_subtype: product_subtype.into(),
        }
    }

    /// Record endpoint: `{base}/data/{version}/{family}/{subtype}/{location}/{item}`.
    ///
    /// `extra_param` overrides the configured extra query parameter.
    pub fn record(
        config: &ClientConfig,
        family: &str,
        subtype: &str,
        location: &str,
        item: impl Into<ContextKey>,
        extra_param: Option<&str>,
    ) -> Self {
        let context_key = item.into();
        let path = format!(
            "{}/data/{}/{}/{}/{}/{}",
            config.base_url(),
            config.version(),
            family,
            subtype,
            location,
            urlencoding::encode(&context_key.as_path_segment())
        );
        let url = with_query(path, extra_param.or(config.extra_param()));
        Self::new(url, context_key, ResponseKind::Record, family, subtype)
    }

    /// Tile endpoint: `{base}/data/{version}/{family}/{subtype}/{z}/{x}/{y}.png`.
    pub fn tile(
        config: &ClientConfig,
        family: &str,
        subtype: &str,
        coordinate: (u32, u32, u32),
    ) -> Self {
        let (z, x, y) = coordinate;
        let path = format!(
            "{}/data/{}/{}/{}/{z}/{x}/{y}.png",
            config.base_url(),
            config.version(),
            family,
            subtype,
        );
        let url = with_query(path, config.extra_param());
        Self::new(url, coordinate, ResponseKind::Tile, family, subtype)
    }

    /// Host portion of the URL, used to key the connection pool.
    pub fn host(&self) -> &str {
        let rest = self
            .url
            .split_once("://")
            .map_or(self.url.as_str(), |(_, rest)| rest);
        let end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
        &rest[..end]
    }
}

fn with_query(path: String, extra_param: Option<&str>) -> String {
    match extra_param.map(|extra| extra.trim_start_matches(|c: char| c == '?' || c == '&')) {
        Some(extra) if !extra.is_empty() => format!("{path}?{extra}"),
        _ => path,
    }
}
