/*
[INPUT]:  Historian API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the WebSocket session as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
    Closed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Authenticated)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Authenticated => "Authenticated",
            ConnectionState::Closed => "Closed",
        };
        f.write_str(text)
    }
}

/// Classification of a quality code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityClass {
    Good,
    Uncertain,
    Bad,
}

impl QualityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityClass::Good => "Good",
            QualityClass::Uncertain => "Uncertain",
            QualityClass::Bad => "Bad",
        }
    }
}

/// RPC methods understood by the historian endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    Authenticate,
    Write,
    ReadRawHistoricalData,
}

impl RpcMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RpcMethod::Authenticate => "authenticate",
            RpcMethod::Write => "write",
            RpcMethod::ReadRawHistoricalData => "read_raw_historical_data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&ConnectionState::Authenticated).unwrap();
        assert_eq!(json, "\"authenticated\"");

        let state: ConnectionState = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(state, ConnectionState::Closed);
        assert!(!state.is_open());
    }

    #[test]
    fn rpc_method_name_matches_serde_name() {
        for method in [
            RpcMethod::Authenticate,
            RpcMethod::Write,
            RpcMethod::ReadRawHistoricalData,
        ] {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json.trim_matches('"'), method.as_str());
        }
    }
}
