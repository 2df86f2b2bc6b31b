/*
[INPUT]:  Historian WebSocket URL and credentials from the environment
[OUTPUT]: Connection events and the last minute of raw history
[POS]:    Examples - connect, read and disconnect
[UPDATE]: When WebSocket API changes
*/

use chrono::{Duration, Utc};
use historian_adapter::*;

/// Example: read raw history of one item
///
/// Environment:
/// - `HISTORIAN_URL` (default `ws://localhost:8002/ws`)
/// - `HISTORIAN_USERNAME`, `HISTORIAN_PASSWORD`
/// - `HISTORIAN_ITEM` (default the DC4711 demo item)
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Historian Raw History Example ===\n");

    let url = std::env::var("HISTORIAN_URL").unwrap_or_else(|_| "ws://localhost:8002/ws".to_string());
    let username = std::env::var("HISTORIAN_USERNAME").unwrap_or_default();
    let password = std::env::var("HISTORIAN_PASSWORD").unwrap_or_default();
    let item = std::env::var("HISTORIAN_ITEM")
        .unwrap_or_else(|_| "/System/Core/Examples/Demo Data/Process Data/DC4711".to_string());

    let mut client = HistorianClient::new();
    let mut events = client.take_events().expect("Receiver already taken");
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("event: {event:?}");
        }
    });

    let response = client
        .connect_ws(&url, ConnectOptions::new(username, password, true))
        .await?;
    if let Some(message) = response.first_error_message() {
        println!("Connect failed: {message}");
    }
    println!("{}\n", client.connection_info());

    let end = Utc::now();
    let start = end - Duration::minutes(1);
    let response = client
        .read_raw_historical_data(
            &[Identity::new(item.as_str())],
            start,
            end,
            ReadRawHistoricalDataOptions::default(),
        )
        .await?;

    match response.outcome() {
        RawHistoryOutcome::Error(errors) => println!("error: {}", errors[0]),
        RawHistoryOutcome::Data(data) => {
            for value in data.item_values() {
                println!("{value} ({})", value.quality_text());
            }
            println!("\n{} values", data.value_count());
        }
        RawHistoryOutcome::Strategy(strategy) => {
            println!("strategy with {} chunks", strategy.chunk_count());
        }
        RawHistoryOutcome::Empty => println!("no data"),
    }

    client.disconnect().await?;
    println!("\n✓ Example complete");
    Ok(())
}
