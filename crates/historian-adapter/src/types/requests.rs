/*
[INPUT]:  Historian API schema definitions and serde requirements
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::serde_helpers;
use super::models::{Identity, ItemValue};
use crate::history::FilterExpr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub items: Vec<ItemValue>,
}

/// Options for a raw history read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRawHistoricalDataOptions {
    /// Include the bounding values just outside the interval.
    pub bounds: bool,
    /// Requested fields, e.g. `["ALL"]`. Empty means the server default.
    pub fields: Vec<String>,
    pub filter: Option<FilterExpr>,
}

impl ReadRawHistoricalDataOptions {
    pub fn all_fields() -> Self {
        Self {
            fields: vec!["ALL".to_string()],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRawHistoricalDataRequest {
    pub items: Vec<Identity>,
    #[serde(with = "serde_helpers::timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "serde_helpers::timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub bounds: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
}

impl ReadRawHistoricalDataRequest {
    pub fn new(
        items: &[Identity],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: &ReadRawHistoricalDataOptions,
    ) -> Self {
        Self {
            items: items.to_vec(),
            start_time,
            end_time,
            bounds: options.bounds,
            fields: options.fields.clone(),
            filter: options.filter.clone(),
        }
    }
}
