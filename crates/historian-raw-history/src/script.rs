/*
[INPUT]:  Script configuration and a historical data API
[OUTPUT]: Console transcript of connect, write, raw read and filtered read
[POS]:    Script layer - the step-by-step raw history session
[UPDATE]: When adding steps or changing printed output
*/

use std::io::Write;

use anyhow::{Context, Result};
use historian_adapter::{
    ClientEvent, ConnectOptions, HistorianClient, HistoricalDataApi, Identity, ItemValue,
    RawHistoricalDataResponse, RawHistoryContext, RawHistoryOutcome, ReadRawHistoricalDataOptions,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ScriptConfig;
use crate::samples::{demo_filter, generate_write_items};

pub const STRATEGY_NOTICE: &str =
    "A strategy is returned by the server, which will be described in an other example.";

/// Build a client, take its event stream and connect with authentication.
///
/// A rejected login is printed and the session continues; a transport
/// failure is printed and returned.
pub async fn create_api_client<W: Write>(
    config: &ScriptConfig,
    out: &mut W,
) -> Result<(HistorianClient, mpsc::Receiver<ClientEvent>)> {
    let mut client = HistorianClient::with_config(config.client_config());
    let events = client
        .take_events()
        .context("client event receiver already taken")?;
    let options = ConnectOptions::new(config.username.as_str(), config.password.as_str(), true);

    match client.connect_ws(&config.url, options).await {
        Ok(response) => {
            if let Some(message) = response.first_error_message() {
                writeln!(out, "Connect failed: {message}")?;
            } else if let Some(info) = &response.data {
                info!(url = %config.url, state = %info.state, "api client ready");
            }
        }
        Err(err) => {
            writeln!(out, "Error occurred during client creation: {err}")?;
            return Err(err).context("create api client");
        }
    }
    writeln!(out)?;

    Ok((client, events))
}

/// The write and read steps, printed to `out`.
pub struct SessionScript<'a, A: ?Sized, W> {
    api: &'a A,
    config: &'a ScriptConfig,
    out: W,
}

impl<'a, A, W> SessionScript<'a, A, W>
where
    A: HistoricalDataApi + ?Sized,
    W: Write,
{
    pub fn new(api: &'a A, config: &'a ScriptConfig, out: W) -> Self {
        Self { api, config, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write samples, read them back, then read them back filtered.
    pub async fn run(&mut self) -> Result<()> {
        let identities = self.config.identities();
        let items = generate_write_items(
            &identities,
            self.config.start_time,
            self.config.samples,
            self.config.interval()?,
        );

        self.write_multiple_items_at_once(&items).await?;
        self.read_raw_historical_data(&identities).await?;
        self.read_raw_historical_data_filtered(&identities).await?;
        Ok(())
    }

    pub async fn write_multiple_items_at_once(&mut self, items: &[ItemValue]) -> Result<()> {
        writeln!(self.out, "Result of write_multiple_items_at_once:")?;

        let response = self
            .api
            .write(items)
            .await
            .context("write_multiple_items_at_once")?;

        if let Some(message) = response.first_error_message() {
            writeln!(self.out, "An error has occurred : {message}")?;
        } else {
            for item in response.data.iter().flatten() {
                writeln!(self.out, "ItemValue: {item}")?;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub async fn read_raw_historical_data(&mut self, identities: &[Identity]) -> Result<()> {
        writeln!(self.out, "Result of read_raw_historical_data:")?;

        let response = self
            .api
            .read_raw_historical_data(
                identities,
                self.config.start_time,
                self.config.read_end_time()?,
                ReadRawHistoricalDataOptions::default(),
            )
            .await
            .context("read_raw_historical_data")?;

        self.print_raw_history(&response)?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Needs a second identity for the filter; skipped otherwise.
    pub async fn read_raw_historical_data_filtered(
        &mut self,
        identities: &[Identity],
    ) -> Result<()> {
        let Some(second) = identities.get(1) else {
            warn!(
                identities = identities.len(),
                "filtered read skipped; it needs a second identity"
            );
            return Ok(());
        };

        writeln!(self.out, "Result of read_raw_historical_data_filtered:")?;

        let mut context = RawHistoryContext::new();
        context
            .where_(demo_filter(second, self.config.start_time))
            .set_filter();

        let response = self
            .api
            .read_raw_historical_data_filtered(
                &context,
                identities,
                self.config.start_time,
                self.config.filtered_read_end_time()?,
                ReadRawHistoricalDataOptions::all_fields(),
            )
            .await
            .context("read_raw_historical_data_filtered")?;

        self.print_raw_history(&response)?;
        if let RawHistoryOutcome::Data(data) = response.outcome() {
            let total = data
                .summarize_duration_for(&second.path)
                .map(|duration| duration.to_string())
                .unwrap_or_default();
            writeln!(self.out, "\nTotal duration for Item '{}': {}", second.path, total)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn print_raw_history(&mut self, response: &RawHistoricalDataResponse) -> Result<()> {
        match response.outcome() {
            RawHistoryOutcome::Error(errors) => {
                if let Some(error) = errors.first() {
                    writeln!(self.out, "An error has occurred : {}", error.message)?;
                }
            }
            RawHistoryOutcome::Data(data) => {
                for query_data in data.query_data_iter() {
                    for item in query_data.items_iter() {
                        for value in item.item_value_iter() {
                            writeln!(self.out, "ItemValue: {value}")?;
                        }
                    }
                }
            }
            RawHistoryOutcome::Strategy(strategy) => {
                info!(
                    chunks = strategy.chunk_count(),
                    query_count_limit = strategy.query_count_limit,
                    "server returned a query strategy"
                );
                writeln!(self.out, "{STRATEGY_NOTICE}")?;
            }
            RawHistoryOutcome::Empty => {}
        }
        Ok(())
    }
}

/// What `--dry-run` prints instead of connecting.
pub fn print_plan<W: Write>(config: &ScriptConfig, out: &mut W) -> Result<()> {
    let identities = config.identities();
    let value_count = identities.len() * config.samples as usize;

    writeln!(out, "Plan for {}:", config.url)?;
    if config.username.is_empty() {
        writeln!(out, "  connect anonymously")?;
    } else {
        writeln!(out, "  connect and authenticate as '{}'", config.username)?;
    }
    writeln!(
        out,
        "  write {value_count} values ({} per identity, every {} ms)",
        config.samples, config.interval_ms
    )?;
    for identity in &identities {
        writeln!(out, "    - {identity}")?;
    }
    writeln!(
        out,
        "  read raw history from {} to {}",
        config.start_time.to_rfc3339(),
        config.read_end_time()?.to_rfc3339()
    )?;
    match identities.get(1) {
        Some(second) => writeln!(
            out,
            "  read filtered raw history to {} and total the duration of '{}'",
            config.filtered_read_end_time()?.to_rfc3339(),
            second.name()
        )?,
        None => writeln!(out, "  skip the filtered read (needs a second identity)")?,
    }
    Ok(())
}
