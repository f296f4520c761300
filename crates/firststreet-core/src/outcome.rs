//! Per-request results handed back to the object-construction layer.
//!
//! Successes and soft failures (`InvalidId`, `NetworkError`) are plain data.
//! Hard failures never appear here; they travel as
//! [`ApiError`](crate::ApiError) on the `Err` side.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::descriptor::{ContextKey, ResponseKind};

/// Field name used to echo the identifier of an invalid lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierKey {
    #[serde(rename = "fsid")]
    Fsid,
    #[serde(rename = "adaptationId")]
    AdaptationId,
    #[serde(rename = "eventId")]
    EventId,
    #[serde(rename = "coordinate")]
    Coordinate,
}

impl IdentifierKey {
    /// Key for a record lookup, chosen by product family and subtype.
    pub fn for_product(family: &str, subtype: &str) -> Self {
        match (family, subtype) {
            ("adaptation", "detail") => Self::AdaptationId,
            ("historic", "event") => Self::EventId,
            _ => Self::Fsid,
        }
    }

    pub fn for_kind(kind: ResponseKind, family: &str, subtype: &str) -> Self {
        match kind {
            ResponseKind::Tile => Self::Coordinate,
            ResponseKind::Record => Self::for_product(family, subtype),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fsid => "fsid",
            Self::AdaptationId => "adaptationId",
            Self::EventId => "eventId",
            Self::Coordinate => "coordinate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Decoded JSON record.
    Record { context_key: ContextKey, body: Value },
    /// Binary tile.
    Tile {
        context_key: ContextKey,
        image: Vec<u8>,
    },
    /// The resource does not exist server-side.
    InvalidId {
        context_key: ContextKey,
        key: IdentifierKey,
    },
    /// Transport failure after retries were exhausted or not applicable.
    NetworkError { context_key: ContextKey },
}

impl ExecutionResult {
    pub fn context_key(&self) -> &ContextKey {
        match self {
            Self::Record { context_key, .. }
            | Self::Tile { context_key, .. }
            | Self::InvalidId { context_key, .. }
            | Self::NetworkError { context_key } => context_key,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Record { .. } | Self::Tile { .. })
    }

    /// `false` only for [`ExecutionResult::InvalidId`].
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::InvalidId { .. })
    }

    pub fn record(&self) -> Option<&Value> {
        match self {
            Self::Record { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&[u8]> {
        match self {
            Self::Tile { image, .. } => Some(image),
            _ => None,
        }
    }

    /// JSON view consumed by the model layer.
    ///
    /// Records are returned as decoded. Invalid ids become
    /// `{<key>: context, "valid": false}` (tiles add `"image": null`) and
    /// network errors become `{"search_item": context}`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Record { body, .. } => body.clone(),
            Self::Tile { context_key, image } => json!({
                "coordinate": context_key,
                "image": image,
            }),
            Self::InvalidId { context_key, key } => {
                let mut map = Map::new();
                map.insert(key.as_str().to_owned(), context_key.as_value().clone());
                if *key == IdentifierKey::Coordinate {
                    map.insert(String::from("image"), Value::Null);
                }
                map.insert(String::from("valid"), Value::Bool(false));
                Value::Object(map)
            }
            Self::NetworkError { context_key } => json!({ "search_item": context_key }),
        }
    }
}
