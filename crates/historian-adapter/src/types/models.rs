/*
[INPUT]:  Historian API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::enums::{ConnectionState, QualityClass};

/// Path-like reference to a data point on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "p")]
    pub path: String,
}

impl Identity {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Last segment of the path, e.g. `DC4711` for `/System/.../DC4711`.
    pub fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    pub fn is_valid(&self) -> bool {
        !self.path.trim().is_empty()
    }
}

impl From<&str> for Identity {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// 32-bit quality/status code. The two most significant bits select the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    pub const GOOD: Quality = Quality(0);
    pub const UNCERTAIN: Quality = Quality(0x4000_0000);
    pub const BAD: Quality = Quality(0x8000_0000);

    pub fn class(self) -> QualityClass {
        match self.0 >> 30 {
            0 => QualityClass::Good,
            1 => QualityClass::Uncertain,
            _ => QualityClass::Bad,
        }
    }

    pub fn text(self) -> &'static str {
        self.class().as_str()
    }

    pub fn is_good(self) -> bool {
        self.class() == QualityClass::Good
    }
}

impl From<u32> for Quality {
    fn from(code: u32) -> Self {
        Quality(code)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (value, quality, timestamp) sample for one item path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemValue {
    #[serde(rename = "p")]
    pub path: String,
    #[serde(rename = "v")]
    pub value: Value,
    #[serde(rename = "q", default)]
    pub quality: Quality,
    #[serde(rename = "t", with = "serde_helpers::timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ItemValue {
    pub fn new(
        path: impl Into<String>,
        value: impl Into<Value>,
        quality: impl Into<Quality>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            quality: quality.into(),
            timestamp,
        }
    }

    pub fn value_as_f64(&self) -> Option<f64> {
        value_as_f64(&self.value)
    }
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} V:{} Q:{} T:{}",
            self.path,
            DisplayValue(&self.value),
            self.quality,
            serde_helpers::format_timestamp(&self.timestamp)
        )
    }
}

/// Error entry reported by the server inside a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)
    }
}

/// Connection snapshot published on every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsConnectionInfo {
    pub state: ConnectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub authenticated: bool,
}

impl WsConnectionInfo {
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            url: None,
            session_id: None,
            connection_id: None,
            authenticated: false,
        }
    }

    pub(crate) fn with_state(&self, state: ConnectionState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}

impl fmt::Display for WsConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection state: {}", self.state)?;
        if let Some(url) = &self.url {
            write!(f, ", url: {url}")?;
        }
        if let Some(session_id) = &self.session_id {
            write!(f, ", session: {session_id}")?;
        }
        write!(f, ", authenticated: {}", self.authenticated)
    }
}

/// Chunking plan returned when a raw read exceeds the server's query count limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStrategy {
    #[serde(default)]
    pub query_count_limit: u64,
    #[serde(default)]
    pub chunks: Vec<StrategyChunk>,
}

impl QueryStrategy {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyChunk {
    #[serde(with = "serde_helpers::timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "serde_helpers::timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<Identity>,
}

/// Numeric view of a JSON value: numbers, booleans and numeric strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Prints strings without the JSON quotes.
pub(crate) struct DisplayValue<'a>(pub &'a Value);

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(raw) => f.write_str(raw),
            other => write!(f, "{other}"),
        }
    }
}

pub(crate) mod serde_helpers {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

    pub fn format_timestamp(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn millis_to_timestamp(millis: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(millis).single()
    }

    /// RFC 3339 with millisecond precision on the way out; RFC 3339 strings or
    /// epoch milliseconds on the way in.
    pub mod timestamp {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};
        use serde_json::Value;

        pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&super::format_timestamp(value))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Value::deserialize(deserializer)?;
            if let Some(raw) = value.as_str() {
                return DateTime::parse_from_rfc3339(raw)
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom);
            }

            if let Some(millis) = value.as_i64() {
                return super::millis_to_timestamp(millis)
                    .ok_or_else(|| serde::de::Error::custom("timestamp out of range"));
            }

            Err(serde::de::Error::custom("invalid timestamp value"))
        }
    }
}
