/*
[INPUT]:  Historian API schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

use super::history::RawHistoricalData;
use super::models::{ApiError, ItemValue, QueryStrategy, WsConnectionInfo};

/// Response envelope shared by all RPC methods: data or a list of errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<ApiError>>,
}

impl<T> ApiResponse<T> {
    pub fn has_error(&self) -> bool {
        self.error.as_ref().is_some_and(|errors| !errors.is_empty())
    }

    pub fn first_error_message(&self) -> Option<&str> {
        first_message(&self.error)
    }
}

pub type ConnectionResponse = ApiResponse<WsConnectionInfo>;

/// Echo of the written values.
pub type WriteResponse = ApiResponse<Vec<ItemValue>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHistoricalDataResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RawHistoricalData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<ApiError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<QueryStrategy>,
}

/// What a raw history response carries, by precedence error > data > strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawHistoryOutcome<'a> {
    Error(&'a [ApiError]),
    Data(&'a RawHistoricalData),
    Strategy(&'a QueryStrategy),
    Empty,
}

impl RawHistoricalDataResponse {
    pub fn outcome(&self) -> RawHistoryOutcome<'_> {
        if let Some(errors) = self.error.as_deref()
            && !errors.is_empty()
        {
            return RawHistoryOutcome::Error(errors);
        }
        if let Some(data) = &self.data {
            return RawHistoryOutcome::Data(data);
        }
        if let Some(strategy) = &self.strategy {
            return RawHistoryOutcome::Strategy(strategy);
        }
        RawHistoryOutcome::Empty
    }

    pub fn first_error_message(&self) -> Option<&str> {
        first_message(&self.error)
    }
}

fn first_message(errors: &Option<Vec<ApiError>>) -> Option<&str> {
    errors
        .as_ref()
        .and_then(|errors| errors.first())
        .map(|error| error.message.as_str())
}
