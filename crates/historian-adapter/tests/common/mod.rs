/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Scripted in-process historian WebSocket server and fixtures
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or server behaviors
*/

//! Common test utilities for historian-adapter tests

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const SESSION_ID: &str = "session-1";

/// What the server does with `write` requests.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehavior {
    /// Store the values and echo them back.
    Echo,
    /// Never answer.
    Ignore,
    /// Answer with a close frame.
    Close,
    /// Drop the TCP connection without a close handshake.
    Drop,
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub write: WriteBehavior,
    /// Frame sent right after the handshake.
    pub greeting: Option<Value>,
    /// Returned for every raw read instead of data.
    pub strategy: Option<Value>,
    /// Close the connection right after the greeting.
    pub close_after_greeting: bool,
    /// Answer `authenticate` with an envelope carrying neither data nor errors.
    pub empty_auth_reply: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            write: WriteBehavior::Echo,
            greeting: None,
            strategy: None,
            close_after_greeting: false,
            empty_auth_reply: false,
        }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    requests: Mutex<Vec<Value>>,
    stored: Mutex<Vec<Value>>,
}

/// In-process historian speaking the JSON envelope protocol.
pub struct MockHistorianServer {
    url: String,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

#[allow(dead_code)]
impl MockHistorianServer {
    pub async fn start() -> Self {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(ServerState::default());

        let task = tokio::spawn(serve(listener, state.clone(), Arc::new(options)));
        Self {
            url: format!("ws://{addr}/ws"),
            state,
            task,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every request envelope received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|request| request["method"] == method)
            .collect()
    }
}

impl Drop for MockHistorianServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, state: Arc<ServerState>, options: Arc<ServerOptions>) {
    while let Ok((stream, _)) = listener.accept().await {
        let state = state.clone();
        let options = options.clone();
        tokio::spawn(async move {
            let _ = handle_connection(stream, state, options).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<ServerState>,
    options: Arc<ServerOptions>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut ws = accept_async(stream).await?;
    if let Some(greeting) = &options.greeting {
        ws.send(Message::Text(greeting.to_string().into())).await?;
    }
    if options.close_after_greeting {
        ws.close(None).await?;
        while let Some(Ok(_)) = ws.next().await {}
        return Ok(());
    }

    let mut authenticated = false;
    while let Some(message) = ws.next().await {
        let Message::Text(text) = message? else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        state.requests.lock().unwrap().push(request.clone());

        let reqid = request["reqid"].clone();
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let allowed = authenticated || credentials_match(&request["auth"]);

        let reply = match method.as_str() {
            "authenticate" if options.empty_auth_reply => json!({"type": "resp", "reqid": reqid}),
            "authenticate" => {
                if credentials_match(&request["data"]) {
                    authenticated = true;
                    json!({
                        "type": "resp",
                        "reqid": reqid,
                        "data": {
                            "state": "authenticated",
                            "session_id": SESSION_ID,
                            "authenticated": true
                        }
                    })
                } else {
                    error_reply(&reqid, 401, "Invalid credentials")
                }
            }
            _ if !allowed => error_reply(&reqid, 401, "Not authenticated"),
            "write" => match options.write {
                WriteBehavior::Echo => {
                    let items = request["data"]["items"].clone();
                    if let Some(values) = items.as_array() {
                        state.stored.lock().unwrap().extend(values.iter().cloned());
                    }
                    json!({"type": "resp", "reqid": reqid, "data": items})
                }
                WriteBehavior::Ignore => continue,
                WriteBehavior::Close => {
                    ws.close(Some(CloseFrame {
                        code: CloseCode::Away,
                        reason: "maintenance".into(),
                    }))
                    .await?;
                    continue;
                }
                WriteBehavior::Drop => return Ok(()),
            },
            "read_raw_historical_data" => match &options.strategy {
                Some(strategy) => json!({"type": "resp", "reqid": reqid, "strategy": strategy}),
                None => read_raw_reply(&state, &reqid, &request["data"]),
            },
            other => json!({
                "type": "error",
                "reqid": reqid,
                "error": [{"code": 404, "message": format!("unknown method {other}")}]
            }),
        };

        ws.send(Message::Text(reply.to_string().into())).await?;
    }
    Ok(())
}

fn credentials_match(value: &Value) -> bool {
    value["username"] == USERNAME && value["password"] == PASSWORD
}

fn error_reply(reqid: &Value, code: i64, message: &str) -> Value {
    json!({
        "type": "resp",
        "reqid": reqid,
        "error": [{"code": code, "message": message}]
    })
}

fn read_raw_reply(state: &ServerState, reqid: &Value, data: &Value) -> Value {
    let start = parse_millis(&data["start_time"]).unwrap_or(i64::MIN);
    let end = parse_millis(&data["end_time"]).unwrap_or(i64::MAX);
    let stored = state.stored.lock().unwrap();

    let items: Vec<Value> = data["items"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|identity| {
            let path = &identity["p"];
            let mut rows: Vec<(i64, Value, Value)> = stored
                .iter()
                .filter(|item| &item["p"] == path)
                .filter_map(|item| {
                    let millis = parse_millis(&item["t"])?;
                    (start..=end)
                        .contains(&millis)
                        .then(|| (millis, item["v"].clone(), item["q"].clone()))
                })
                .collect();
            rows.sort_by_key(|(millis, _, _)| *millis);

            json!({
                "p": path,
                "v": rows.iter().map(|(_, value, _)| value.clone()).collect::<Vec<_>>(),
                "q": rows.iter().map(|(_, _, quality)| quality.clone()).collect::<Vec<_>>(),
                "t": rows.iter().map(|(millis, _, _)| *millis).collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "type": "resp",
        "reqid": reqid,
        "data": {
            "query_data": [{
                "start_time": data["start_time"],
                "end_time": data["end_time"],
                "items": items
            }]
        }
    })
}

fn parse_millis(value: &Value) -> Option<i64> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}

/// 2018-01-01T00:00:00Z
#[allow(dead_code)]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap()
}
