/*
[INPUT]:  WebSocket URL, connect options and RPC requests
[OUTPUT]: Correlated RPC responses and connection events
[POS]:    WebSocket layer - historian session transport
[UPDATE]: When adding RPC methods or changing connection logic
*/

pub mod client;
pub mod error;
pub mod message;

pub use client::{ClientConfig, ClientEvent, HistorianClient};
pub use error::{HistorianError, Result};
pub use message::{ClientMessage, RpcRequest, RpcResponse, ServerMessage};
