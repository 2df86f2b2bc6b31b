/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Raw history session transcript on stdout, logs on stderr or file
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use historian_raw_history::{ScriptConfig, SessionScript, create_api_client, print_events, print_plan};

#[derive(Parser, Debug)]
#[command(name = "historian-raw-history", version, about = "Write and read back raw history over WebSocket")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    #[arg(long, value_name = "NAME")]
    username: Option<String>,
    #[arg(long, env = "HISTORIAN_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Also write logs to a daily rolling file in this directory
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Wait for Enter before disconnecting
    #[arg(long = "wait-for-enter")]
    wait_for_enter: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let _log_guard = init_tracing(&args.log_level, args.log_dir.as_deref())?;

    info!(
        config_path = ?args.config_path,
        dry_run = args.dry_run,
        "starting historian-raw-history"
    );

    let config = load_config(&args)?;
    config.validate().context("invalid configuration")?;
    info!(
        url = %config.url,
        identities = config.identities.len(),
        samples = config.samples,
        "configuration loaded"
    );

    let mut stdout = std::io::stdout();
    if args.dry_run {
        print_plan(&config, &mut stdout)?;
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let (client, events) = create_api_client(&config, &mut stdout).await?;
    let printer = tokio::spawn(print_events(events));

    let mut script = SessionScript::new(&client, &config, std::io::stdout());
    let outcome = tokio::select! {
        result = script.run() => result,
        _ = shutdown.cancelled() => {
            warn!("session interrupted");
            Ok(())
        }
    };
    if let Err(err) = &outcome {
        warn!(error = %err, "session aborted");
    }

    if args.wait_for_enter && !shutdown.is_cancelled() {
        wait_for_enter(&shutdown).await;
    }

    drop(script);
    client.disconnect().await.context("disconnect")?;
    drop(client);
    if let Err(err) = printer.await {
        warn!(error = %err, "event printer failed");
    }
    info!("session finished");

    outcome
}

fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let guard = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "historian-raw-history.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            Some(guard)
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            None
        }
    };
    Ok(guard)
}

fn load_config(args: &Cli) -> Result<ScriptConfig> {
    let mut config = match &args.config_path {
        Some(path) => {
            let path_str = path.to_str().context("config path must be valid utf-8")?;
            ScriptConfig::from_file(path_str).context("load config")?
        }
        None => ScriptConfig::default(),
    };

    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(username) = &args.username {
        config.username = username.clone();
    }
    if let Some(password) = &args.password {
        config.password = password.clone();
    }
    Ok(config)
}

async fn wait_for_enter(shutdown: &CancellationToken) {
    println!("Press Enter to disconnect.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tokio::select! {
        line = lines.next_line() => {
            if let Err(err) = line {
                warn!(error = %err, "failed to read stdin");
            }
        }
        _ = shutdown.cancelled() => {}
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
