use chrono::{DateTime, NaiveDateTime, Utc};
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod backoff;
pub mod config;
pub mod dedup;
pub mod format;
pub mod range;
pub mod search;
pub mod streams;
pub mod tail;

pub use backoff::Backoff;
pub use crate::config::Settings;
pub use dedup::DedupCache;
pub use format::{Formatter, Template};
pub use search::{SearchClient, SearchQuery, TimeWindow};
pub use streams::StreamDirectory;
pub use tail::Tailer;

/// A single log message returned by the search API.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Server-supplied fields, untouched.
    pub fields: Map<String, Value>,
}

impl LogMessage {
    /// Builds a message from the server's field map. The id is taken from
    /// `_id` (or `id`) and the `timestamp` field must be parseable.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self> {
        let id = ["_id", "id"]
            .iter()
            .find_map(|key| match fields.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| eyre!("message has no id"))?;

        let timestamp = match fields.get("timestamp") {
            Some(Value::String(s)) => parse_timestamp(s)?,
            _ => return Err(eyre!("message {} has no timestamp", id)),
        };

        Ok(Self {
            id,
            timestamp,
            fields,
        })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Parses server timestamps like `2020-01-01T00:00:00.000Z`. Timestamps
/// without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| eyre!("invalid timestamp '{}'", s))
}

/// A server-defined stream of messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stream {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Response body of `GET /streams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsJson {
    #[serde(default)]
    pub total: usize,
    pub streams: Vec<Stream>,
}
