/*
[INPUT]:  Client events (connection changes, unsolicited errors, close)
[OUTPUT]: Console lines describing each event
[POS]:    Script layer - event printer running beside the session
[UPDATE]: When client events or their printed form change
*/

use historian_adapter::ClientEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Lines printed for one event.
pub fn describe_event(event: &ClientEvent) -> Vec<String> {
    match event {
        ClientEvent::ConnectionChanged(info) => vec![info.to_string()],
        ClientEvent::Error { errors, .. } => {
            errors.iter().map(|error| error.message.clone()).collect()
        }
        ClientEvent::Closed { was_clean, reason } => {
            let mut lines = Vec::new();
            if !was_clean {
                lines.push("Connection is forcibly closed.".to_string());
                lines.extend(reason.clone());
            }
            lines.push("Connection is closed.".to_string());
            lines
        }
    }
}

/// Print events until every sender is gone.
pub async fn print_events(mut events: mpsc::Receiver<ClientEvent>) {
    while let Some(event) = events.recv().await {
        for line in describe_event(&event) {
            println!("{line}");
        }
    }
    debug!("event stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use historian_adapter::{ApiError, ConnectionState, WsConnectionInfo};

    #[test]
    fn connection_change_prints_info() {
        let info = WsConnectionInfo {
            state: ConnectionState::Connected,
            url: Some("ws://localhost:8002/ws".to_string()),
            ..WsConnectionInfo::disconnected()
        };
        assert_eq!(
            describe_event(&ClientEvent::ConnectionChanged(info)),
            vec!["Connection state: Connected, url: ws://localhost:8002/ws, authenticated: false"]
        );
    }

    #[test]
    fn errors_print_one_line_each() {
        let event = ClientEvent::Error {
            errors: vec![
                ApiError {
                    code: 1,
                    message: "first".to_string(),
                },
                ApiError {
                    code: 2,
                    message: "second".to_string(),
                },
            ],
            request_id: None,
        };
        assert_eq!(describe_event(&event), vec!["first", "second"]);
    }

    #[test]
    fn close_lines() {
        let clean = ClientEvent::Closed {
            was_clean: true,
            reason: Some("bye".to_string()),
        };
        assert_eq!(describe_event(&clean), vec!["Connection is closed."]);

        let forced = ClientEvent::Closed {
            was_clean: false,
            reason: Some("Connection reset without closing handshake".to_string()),
        };
        assert_eq!(
            describe_event(&forced),
            vec![
                "Connection is forcibly closed.",
                "Connection reset without closing handshake",
                "Connection is closed."
            ]
        );
    }
}
