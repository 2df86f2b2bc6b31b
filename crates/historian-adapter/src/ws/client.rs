/*
[INPUT]:  WebSocket URL, connect options, RPC requests
[OUTPUT]: Correlated RPC responses, connection state and client events
[POS]:    WebSocket layer - historian session client
[UPDATE]: When adding RPC methods or changing connection logic
*/

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::error::{HistorianError, Result};
use super::message::{ClientMessage, RpcRequest, RpcResponse, ServerMessage};
use crate::api::HistoricalDataApi;
use crate::auth::{ConnectOptions, SessionManager};
use crate::types::{
    ApiError, ApiResponse, ConnectionResponse, ConnectionState, Identity, ItemValue,
    RawHistoricalDataResponse, ReadRawHistoricalDataOptions, ReadRawHistoricalDataRequest,
    RpcMethod, WriteRequest, WriteResponse, WsConnectionInfo,
};

const UNKNOWN_FRAME_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;
const OUTBOUND_CAPACITY: usize = 100;

static UNKNOWN_FRAME_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Capacity of the event channel returned by `take_events`
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            event_capacity: 100,
        }
    }
}

/// Notifications emitted by the client outside of request/response pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ConnectionChanged(WsConnectionInfo),
    /// Server errors that could not be routed to a waiting request
    Error {
        errors: Vec<ApiError>,
        request_id: Option<u64>,
    },
    Closed {
        was_clean: bool,
        reason: Option<String>,
    },
}

/// WebSocket client for the historian API
#[derive(Debug)]
pub struct HistorianClient {
    config: ClientConfig,
    session: SessionManager,
    next_reqid: AtomicU64,
    pending: PendingMap,
    outbound_tx: Mutex<Option<mpsc::Sender<WsMessage>>>,
    io_task: Mutex<Option<JoinHandle<()>>>,
    connection: Arc<watch::Sender<WsConnectionInfo>>,
    event_tx: mpsc::Sender<ClientEvent>,
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
}

impl HistorianClient {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (connection, _rx) = watch::channel(WsConnectionInfo::disconnected());
        Self {
            config,
            session: SessionManager::new(),
            next_reqid: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound_tx: Mutex::new(None),
            io_task: Mutex::new(None),
            connection: Arc::new(connection),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Get the event receiver. Only the first call returns `Some`.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Latest connection snapshot
    pub fn connection_info(&self) -> WsConnectionInfo {
        self.connection.borrow().clone()
    }

    /// Subscribe to connection snapshots
    pub fn subscribe_connection(&self) -> watch::Receiver<WsConnectionInfo> {
        self.connection.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.borrow().state.is_open()
    }

    /// Connect and, depending on `options`, authenticate.
    ///
    /// Transport failures are returned as `Err`; a rejected authentication
    /// is returned as a response carrying the server's errors.
    pub async fn connect_ws(&self, url: &str, options: ConnectOptions) -> Result<ConnectionResponse> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(HistorianError::InvalidRequest(format!(
                "unsupported URL scheme '{}', expected ws or wss",
                parsed.scheme()
            )));
        }

        let base = WsConnectionInfo {
            state: ConnectionState::Connecting,
            url: Some(parsed.to_string()),
            session_id: None,
            connection_id: Some(Uuid::new_v4().to_string()),
            authenticated: false,
        };
        let claimed = self.connection.send_if_modified(|current| {
            if current.state.is_open() || current.state == ConnectionState::Connecting {
                return false;
            }
            *current = base.clone();
            true
        });
        if !claimed {
            return Err(HistorianError::AlreadyConnected);
        }
        emit(&self.event_tx, ClientEvent::ConnectionChanged(base.clone()));
        info!(url = %parsed, "connecting to historian");

        let connect = tokio::time::timeout(self.config.connect_timeout, connect_async(parsed.as_str())).await;
        let ws_stream = match connect {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(err)) => {
                warn!(url = %parsed, error = %err, "websocket connect failed");
                publish(&self.connection, &self.event_tx, WsConnectionInfo::disconnected());
                return Err(err.into());
            }
            Err(_) => {
                warn!(url = %parsed, "websocket connect timed out");
                publish(&self.connection, &self.event_tx, WsConnectionInfo::disconnected());
                return Err(HistorianError::Timeout {
                    duration_ms: millis(self.config.connect_timeout),
                });
            }
        };

        let connected = base.with_state(ConnectionState::Connected);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        *self.outbound_tx.lock().await = Some(outbound_tx);
        self.session.clear();
        // Connected must be visible before the IO task can publish Closed.
        publish(&self.connection, &self.event_tx, connected.clone());
        info!(url = %parsed, "websocket connected");

        let handle = tokio::spawn(run_io_loop(
            ws_stream,
            outbound_rx,
            IoShared {
                pending: self.pending.clone(),
                connection: self.connection.clone(),
                event_tx: self.event_tx.clone(),
                session: self.session.clone(),
            },
        ));
        *self.io_task.lock().await = Some(handle);

        let Some(credentials) = options.credentials else {
            return Ok(ApiResponse {
                data: Some(connected),
                error: None,
            });
        };

        if !options.authenticate {
            debug!(username = %credentials.username, "credentials stored for per-request auth");
            self.session.set_request_credentials(Some(credentials));
            return Ok(ApiResponse {
                data: Some(connected),
                error: None,
            });
        }

        let response: ApiResponse<WsConnectionInfo> = self
            .call(RpcMethod::Authenticate, &credentials.to_request())
            .await?
            .into_api()?;

        if response.has_error() {
            warn!(
                username = %credentials.username,
                error = response.first_error_message().unwrap_or_default(),
                "authentication rejected"
            );
            return Ok(response);
        }
        let Some(granted) = response.data else {
            return Err(HistorianError::InvalidResponse(
                "authenticate answered without data or errors".to_string(),
            ));
        };

        let authenticated = WsConnectionInfo {
            state: ConnectionState::Authenticated,
            session_id: granted.session_id,
            authenticated: true,
            ..connected
        };
        let applied = self.connection.send_if_modified(|current| {
            if current.connection_id != authenticated.connection_id || !current.state.is_open() {
                return false;
            }
            self.session
                .set_session(credentials.username.clone(), authenticated.session_id.clone());
            *current = authenticated.clone();
            true
        });
        if !applied {
            warn!(username = %credentials.username, "connection closed during authentication");
            return Err(HistorianError::NotConnected);
        }
        debug!(state = %authenticated.state, "connection state changed");
        emit(&self.event_tx, ClientEvent::ConnectionChanged(authenticated.clone()));
        info!(username = %credentials.username, "session authenticated");

        Ok(ApiResponse {
            data: Some(authenticated),
            error: None,
        })
    }

    /// Write all values in one request
    pub async fn write(&self, items: &[ItemValue]) -> Result<WriteResponse> {
        if items.is_empty() {
            return Err(HistorianError::InvalidRequest("no items to write".to_string()));
        }
        if let Some(item) = items.iter().find(|item| item.path.trim().is_empty()) {
            return Err(HistorianError::InvalidRequest(format!(
                "item value without path at {}",
                item.timestamp
            )));
        }

        let request = WriteRequest {
            items: items.to_vec(),
        };
        self.call(RpcMethod::Write, &request).await?.into_api()
    }

    /// Read unaggregated values of `items` between `start_time` and `end_time`
    pub async fn read_raw_historical_data(
        &self,
        items: &[Identity],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: ReadRawHistoricalDataOptions,
    ) -> Result<RawHistoricalDataResponse> {
        if items.is_empty() {
            return Err(HistorianError::InvalidRequest("no items to read".to_string()));
        }
        if let Some(identity) = items.iter().find(|identity| !identity.is_valid()) {
            return Err(HistorianError::InvalidRequest(format!(
                "invalid identity path '{identity}'"
            )));
        }
        if start_time > end_time {
            return Err(HistorianError::InvalidRequest(format!(
                "start time {start_time} is after end time {end_time}"
            )));
        }

        let request = ReadRawHistoricalDataRequest::new(items, start_time, end_time, &options);
        self.call(RpcMethod::ReadRawHistoricalData, &request)
            .await?
            .into_raw_history()
    }

    /// Close the connection and wait for the IO task to finish
    pub async fn disconnect(&self) -> Result<()> {
        let sender = self.outbound_tx.lock().await.take();
        let Some(sender) = sender else {
            return Ok(());
        };

        if sender.send(WsMessage::Close(None)).await.is_err() {
            debug!("io task already stopped before close");
        }
        drop(sender);

        let handle = self.io_task.lock().await.take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(self.config.connect_timeout, &mut handle)
                .await
                .is_err()
            {
                warn!("io task did not stop after close; aborting");
                handle.abort();
            }
        }
        self.session.clear();
        Ok(())
    }

    async fn call<T: Serialize>(&self, method: RpcMethod, data: &T) -> Result<RpcResponse> {
        if !self.is_connected() {
            return Err(HistorianError::NotConnected);
        }
        let sender = {
            let guard = self.outbound_tx.lock().await;
            guard.clone().ok_or(HistorianError::NotConnected)?
        };

        let reqid = self.next_reqid.fetch_add(1, Ordering::Relaxed);
        let message = ClientMessage::Request(RpcRequest {
            reqid,
            method,
            data: serde_json::to_value(data)?,
            auth: self
                .session
                .request_credentials()
                .map(|credentials| credentials.to_request()),
        });
        let text = serde_json::to_string(&message)?;

        let (response_tx, response_rx) = oneshot::channel();
        self.pending.lock().await.insert(reqid, response_tx);
        // The IO task may have drained `pending` before the insert.
        if !self.is_connected() {
            self.pending.lock().await.remove(&reqid);
            return Err(HistorianError::ConnectionClosed { reqid });
        }

        if sender.send(WsMessage::Text(text.into())).await.is_err() {
            self.pending.lock().await.remove(&reqid);
            return Err(HistorianError::ConnectionClosed { reqid });
        }
        debug!(reqid, method = method.as_str(), "request sent");

        match tokio::time::timeout(self.config.request_timeout, response_rx).await {
            Ok(Ok(response)) => {
                debug!(
                    reqid,
                    method = method.as_str(),
                    has_error = response.error.is_some(),
                    "response received"
                );
                Ok(response)
            }
            Ok(Err(_)) => Err(HistorianError::ConnectionClosed { reqid }),
            Err(_) => {
                self.pending.lock().await.remove(&reqid);
                warn!(reqid, method = method.as_str(), "request timed out");
                Err(HistorianError::Timeout {
                    duration_ms: millis(self.config.request_timeout),
                })
            }
        }
    }
}

impl Default for HistorianClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoricalDataApi for HistorianClient {
    async fn write(&self, items: &[ItemValue]) -> Result<WriteResponse> {
        HistorianClient::write(self, items).await
    }

    async fn read_raw_historical_data(
        &self,
        items: &[Identity],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: ReadRawHistoricalDataOptions,
    ) -> Result<RawHistoricalDataResponse> {
        HistorianClient::read_raw_historical_data(self, items, start_time, end_time, options).await
    }

    async fn disconnect(&self) -> Result<()> {
        HistorianClient::disconnect(self).await
    }
}

/// State the IO task shares with the client
struct IoShared {
    pending: PendingMap,
    connection: Arc<watch::Sender<WsConnectionInfo>>,
    event_tx: mpsc::Sender<ClientEvent>,
    session: SessionManager,
}

async fn run_io_loop(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound_rx: mpsc::Receiver<WsMessage>,
    shared: IoShared,
) {
    let (mut write, mut read) = ws_stream.split();
    let mut closing = false;
    let mut outbound_open = true;

    let (was_clean, reason) = loop {
        tokio::select! {
            outbound = outbound_rx.recv(), if outbound_open => {
                match outbound {
                    Some(message) => {
                        if matches!(message, WsMessage::Close(_)) {
                            closing = true;
                        }
                        if let Err(err) = write.send(message).await {
                            break (closing, Some(err.to_string()));
                        }
                    }
                    None => {
                        outbound_open = false;
                        if !closing {
                            closing = true;
                            let _ = write.send(WsMessage::Close(None)).await;
                        }
                    }
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(frame))) => {
                        let _ = write.flush().await;
                        let reason = frame
                            .map(|frame| frame.reason.as_str().to_owned())
                            .filter(|reason| !reason.is_empty());
                        break (true, reason);
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(message)) => handle_frame(message, &shared).await,
                    Some(Err(err)) => break (closing, Some(err.to_string())),
                    None => break (closing, None),
                }
            }
        }
    };

    drop(outbound_rx);
    let closed = shared.connection.borrow().with_state(ConnectionState::Closed);
    let closed = WsConnectionInfo {
        authenticated: false,
        ..closed
    };
    publish(&shared.connection, &shared.event_tx, closed);
    shared.session.clear();

    // Dropping the senders fails every waiting request with ConnectionClosed.
    let abandoned = {
        let mut pending = shared.pending.lock().await;
        let count = pending.len();
        pending.clear();
        count
    };
    if was_clean {
        info!(abandoned, "websocket closed");
    } else {
        warn!(abandoned, reason = reason.as_deref().unwrap_or("unknown"), "websocket closed unexpectedly");
    }
    emit(&shared.event_tx, ClientEvent::Closed { was_clean, reason });
}

async fn handle_frame(message: WsMessage, shared: &IoShared) {
    let text = match message {
        WsMessage::Text(text) => text.as_str().to_owned(),
        WsMessage::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => text,
            Err(_) => {
                debug!(bytes = bytes.len(), "ignoring non-utf8 binary frame");
                return;
            }
        },
        _ => return,
    };

    let parsed = match serde_json::from_str::<ServerMessage>(&text) {
        Ok(parsed) => parsed,
        Err(err) => {
            log_parse_fail_once(&err, &text);
            return;
        }
    };

    match parsed {
        ServerMessage::Response(response) => route_response(response, shared).await,
        ServerMessage::Error { reqid, error } => {
            if let Some(reqid) = reqid {
                let waiting = shared.pending.lock().await.contains_key(&reqid);
                if waiting {
                    route_response(RpcResponse::from_errors(reqid, error), shared).await;
                    return;
                }
            }
            for entry in &error {
                warn!(request_id = ?reqid, code = entry.code, message = %entry.message, "server error");
            }
            emit(
                &shared.event_tx,
                ClientEvent::Error {
                    errors: error,
                    request_id: reqid,
                },
            );
        }
        ServerMessage::Connection { data } => {
            let mut merged = None;
            shared.connection.send_if_modified(|current| {
                if !current.state.is_open() {
                    return false;
                }
                // Only the client closes a live connection or changes its id.
                let (state, authenticated) = if data.state.is_open() {
                    (data.state, data.authenticated)
                } else {
                    debug!(pushed = %data.state, "keeping local state for pushed connection frame");
                    (current.state, current.authenticated)
                };
                *current = WsConnectionInfo {
                    state,
                    authenticated,
                    url: data.url.clone().or_else(|| current.url.clone()),
                    connection_id: current.connection_id.clone().or_else(|| data.connection_id.clone()),
                    session_id: data.session_id.clone().or_else(|| current.session_id.clone()),
                };
                merged = Some(current.clone());
                true
            });
            match merged {
                Some(info) => {
                    debug!(state = %info.state, "connection state changed");
                    emit(&shared.event_tx, ClientEvent::ConnectionChanged(info));
                }
                None => debug!("ignoring connection frame for a closed connection"),
            }
        }
        ServerMessage::Other => log_unknown_frame_once(&text),
    }
}

async fn route_response(response: RpcResponse, shared: &IoShared) {
    let reqid = response.reqid;
    let waiter = shared.pending.lock().await.remove(&reqid);
    match waiter {
        Some(waiter) => {
            if waiter.send(response).is_err() {
                debug!(reqid, "response arrived after caller gave up");
            }
        }
        None => debug!(reqid, "response for unknown request id"),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn publish(
    connection: &watch::Sender<WsConnectionInfo>,
    event_tx: &mpsc::Sender<ClientEvent>,
    info: WsConnectionInfo,
) {
    debug!(state = %info.state, "connection state changed");
    connection.send_replace(info.clone());
    emit(event_tx, ClientEvent::ConnectionChanged(info));
}

fn emit(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    if let Err(err) = event_tx.try_send(event) {
        debug!(error = %err, "client event dropped");
    }
}

fn log_unknown_frame_once(raw: &str) {
    let count = UNKNOWN_FRAME_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < UNKNOWN_FRAME_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = UNKNOWN_FRAME_LOG_LIMIT,
            bytes = raw.len(),
            "ws frame type unrecognized"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = UNKNOWN_FRAME_LOG_LIMIT,
            message = %preview,
            "ws frame type unrecognized"
        );
    }
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws frame parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            message = %preview,
            "ws frame parse failed"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
