/*
[INPUT]:  Raw WebSocket text frames
[OUTPUT]: Parsed request/response envelopes
[POS]:    WebSocket layer - message framing and validation
[UPDATE]: When adding new message types or changing format
*/

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::Result;
use crate::types::{
    ApiError, ApiResponse, AuthenticateRequest, RawHistoricalDataResponse, RpcMethod,
    WsConnectionInfo,
};

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "req")]
    Request(RpcRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub reqid: u64,
    pub method: RpcMethod,
    pub data: Value,
    /// Per-request credentials, only for sessions that did not authenticate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthenticateRequest>,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename = "resp")]
    Response(RpcResponse),
    /// Unsolicited connection state change.
    Connection { data: WsConnectionInfo },
    /// Error not tied to a successful response; `reqid` is set when the
    /// server could attribute it to a request.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reqid: Option<u64>,
        #[serde(default)]
        error: Vec<ApiError>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub reqid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<ApiError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Value>,
}

impl RpcResponse {
    pub fn from_errors(reqid: u64, errors: Vec<ApiError>) -> Self {
        Self {
            reqid,
            error: Some(errors),
            ..Default::default()
        }
    }

    /// Decode `data` into the method's payload type.
    pub fn into_api<T: DeserializeOwned>(self) -> Result<ApiResponse<T>> {
        Ok(ApiResponse {
            data: decode_optional(self.data)?,
            error: self.error,
        })
    }

    pub fn into_raw_history(self) -> Result<RawHistoricalDataResponse> {
        Ok(RawHistoricalDataResponse {
            data: decode_optional(self.data)?,
            error: self.error,
            strategy: decode_optional(self.strategy)?,
        })
    }
}

fn decode_optional<T: DeserializeOwned>(value: Option<Value>) -> Result<Option<T>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionState, ItemValue};
    use serde_json::json;

    #[test]
    fn request_envelope_shape() {
        let message = ClientMessage::Request(RpcRequest {
            reqid: 7,
            method: RpcMethod::ReadRawHistoricalData,
            data: json!({"items": []}),
            auth: None,
        });

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "req",
                "reqid": 7,
                "method": "read_raw_historical_data",
                "data": {"items": []}
            })
        );
    }

    #[test]
    fn parses_server_frames() {
        let response: ServerMessage = serde_json::from_str(
            r#"{"type":"resp","reqid":3,"data":[{"p":"/a","v":1,"q":0,"t":"2018-01-01T00:00:00.000Z"}]}"#,
        )
        .unwrap();
        let ServerMessage::Response(response) = response else {
            panic!("expected response");
        };
        assert_eq!(response.reqid, 3);
        let write: ApiResponse<Vec<ItemValue>> = response.into_api().unwrap();
        assert_eq!(write.data.map(|items| items.len()), Some(1));

        let connection: ServerMessage = serde_json::from_str(
            r#"{"type":"connection","data":{"state":"closed"}}"#,
        )
        .unwrap();
        assert!(matches!(
            connection,
            ServerMessage::Connection { data } if data.state == ConnectionState::Closed
        ));

        let error: ServerMessage =
            serde_json::from_str(r#"{"type":"error","error":[{"code":9,"message":"denied"}]}"#)
                .unwrap();
        assert!(matches!(error, ServerMessage::Error { reqid: None, ref error } if error.len() == 1));

        let other: ServerMessage = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(other, ServerMessage::Other);
    }

    #[test]
    fn null_data_decodes_as_none() {
        let response = RpcResponse {
            reqid: 1,
            data: Some(Value::Null),
            ..Default::default()
        };
        let raw = response.into_raw_history().unwrap();
        assert!(raw.data.is_none());
        assert!(raw.strategy.is_none());
    }

    #[test]
    fn malformed_data_is_a_serialization_error() {
        let response = RpcResponse {
            reqid: 1,
            data: Some(json!({"query_data": "nope"})),
            ..Default::default()
        };
        let err = response.into_raw_history().unwrap_err();
        assert!(matches!(err, crate::ws::HistorianError::Serialization(_)));
    }
}
