use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::error::ApiError;

/// Field the server owns on every stored document.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A caller-supplied metric payload: any non-empty JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricDocument(Map<String, Value>);

impl MetricDocument {
    /// Parses a raw request body. Anything but a non-empty JSON object is rejected.
    pub fn parse(raw: &[u8]) -> Result<Self, ApiError> {
        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(fields)) if !fields.is_empty() => Ok(Self(fields)),
            _ => Err(ApiError::InvalidPayload),
        }
    }

    pub fn field_count(&self) -> usize {
        self.0.len()
    }

    /// Sets `timestamp` to `at`, replacing whatever the caller sent.
    pub fn stamp(&mut self, at: OffsetDateTime) -> Result<(), time::error::Format> {
        let rendered = at.format(&Rfc3339)?;
        self.0.insert(TIMESTAMP_FIELD.to_string(), Value::String(rendered));
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for MetricDocument {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusBody {
    pub status: String,
}

impl StatusBody {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_accepts_nested_objects() {
        let doc = MetricDocument::parse(br#"{"cpu": 12.5, "host": {"name": "a", "tags": [1, 2]}}"#)
            .unwrap();
        assert_eq!(doc.field_count(), 2);
        assert_eq!(doc.get("host"), Some(&json!({"name": "a", "tags": [1, 2]})));
    }

    #[test]
    fn parse_rejects_everything_but_non_empty_objects() {
        for raw in [
            &b""[..],
            b"not json",
            b"null",
            b"{}",
            b"[]",
            b"[1, 2]",
            b"\"cpu\"",
            b"42",
            b"{\"cpu\": 1",
        ] {
            assert!(
                matches!(MetricDocument::parse(raw), Err(ApiError::InvalidPayload)),
                "accepted {:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn stamp_overwrites_caller_timestamp() {
        let mut doc = MetricDocument::parse(br#"{"timestamp": "yesterday", "cpu": 1}"#).unwrap();
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        doc.stamp(at).unwrap();

        assert_eq!(doc.field_count(), 2);
        assert_eq!(doc.get(TIMESTAMP_FIELD), Some(&json!("2023-11-14T22:13:20Z")));
    }

    #[test]
    fn field_order_is_preserved() {
        let doc = MetricDocument::parse(br#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = doc.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
