//! Print one realtime YAMCS stream as JSON lines until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use yamcs_client::{ArchiveClient, ClientConfig, Connection, DerivedStream, YamcsSubscriptions};
use yamcs_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Debug, Parser)]
#[command(name = "yamcs-link", about = "Follow realtime streams of a YAMCS server")]
struct Args {
    /// Server URL. Defaults to $YAMCS_URL, then http://localhost:8090.
    #[arg(long)]
    url: Option<String>,

    /// Instance. Defaults to $YAMCS_INSTANCE, then ground_station.
    #[arg(long)]
    instance: Option<String>,

    /// Processor. Defaults to $YAMCS_PROCESSOR, then realtime.
    #[arg(long)]
    processor: Option<String>,

    /// Keep only this many events in the event list.
    #[arg(long)]
    event_window: Option<usize>,

    /// Log as JSON lines.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    stream: Stream,
}

#[derive(Debug, Subcommand)]
enum Stream {
    /// Mission time.
    Time,
    /// Data link status.
    Links,
    /// Command history, newest first.
    Commands,
    /// Values of one parameter.
    Parameter {
        /// Qualified name, e.g. /YSS/SIMULATOR/BatteryVoltage1.
        name: String,
    },
    /// Events, oldest first.
    Events,
    /// Calls the server holds open for this connection.
    State,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_telemetry(&TelemetryConfig {
        json: args.json_logs,
        ..Default::default()
    });

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.url {
        config.url = url;
    }
    if let Some(instance) = args.instance {
        config.instance = instance;
    }
    if let Some(processor) = args.processor {
        config.processor = processor;
    }
    config.event_window = args.event_window;

    let conn = Arc::new(
        Connection::connect(&config)
            .await
            .with_context(|| format!("connecting to {}", config.url))?,
    );
    let subs = YamcsSubscriptions::new(
        Arc::clone(&conn),
        Arc::new(ArchiveClient::new(&config)),
        &config,
    );

    match args.stream {
        Stream::Time => print_until_interrupted(subs.time().await?).await?,
        Stream::Links => print_until_interrupted(subs.links().await?).await?,
        Stream::Commands => print_until_interrupted(subs.commands().await?).await?,
        Stream::Parameter { name } => {
            print_until_interrupted(subs.parameter(&name).await?).await?
        }
        Stream::Events => print_until_interrupted(subs.events().await?).await?,
        Stream::State => println!("{}", serde_json::to_string(&conn.request_state().await?)?),
    }

    tracing::info!(stats = ?conn.stats(), "Shutting down");
    drop(subs);
    if let Ok(conn) = Arc::try_unwrap(conn) {
        conn.close().await;
    }
    Ok(())
}

async fn print_until_interrupted<T: Serialize>(mut stream: DerivedStream<T>) -> Result<()> {
    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(item) => println!("{}", serde_json::to_string(&item)?),
                None => {
                    tracing::info!("Stream ended");
                    return Ok(());
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                return Ok(());
            }
        }
    }
}
