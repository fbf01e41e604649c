//! Ledger query command-line client
//!
//! Runs one balance, holdings or network metrics query through the endpoint
//! pool and prints the result. Ctrl+C cancels the query in flight.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledger_query::{NormalizedResult, QueryClient, QueryConfig, QueryError, QueryEvent, QueryOptions};
use std::path::Path;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Advisories buffered between the query and the printer task
const EVENT_BUFFER: usize = 16;

#[derive(Parser)]
#[command(name = "ledger-query")]
#[command(about = "Resilient Solana account queries over a pool of RPC endpoints")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "ledger-query.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Native SOL balance of an account
    Balance { address: String },
    /// Non-zero token holdings of an account
    Holdings { address: String },
    /// Network throughput, epoch and slot
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_found = Path::new(&cli.config).exists();
    let mut config = if config_found {
        QueryConfig::from_file(&cli.config)?
    } else {
        QueryConfig::default()
    };
    config.apply_env_overrides();

    // Override log level if provided
    if let Some(log_level) = cli.log_level {
        config.monitoring.log_level = log_level;
    }

    // Initialize logging
    init_logging(&config);

    if !config_found {
        warn!("Config file not found, using defaults: {}", cli.config);
    }

    config.validate()?;
    let client = QueryClient::new(&config)?;
    info!("Endpoint pool: {}", client.pool().urls().join(", "));

    if cli.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
    let options = QueryOptions::new()
        .with_cancel(cancel.clone())
        .with_events(events_tx);

    let advisories = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_advisory(&event);
        }
    });

    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
                cancel.cancel();
            }
        }
    });

    let outcome = match cli.command {
        Command::Balance { address } => client
            .query_balance(&address, options)
            .await
            .map(NormalizedResult::Balance),
        Command::Holdings { address } => client
            .query_holdings(&address, options)
            .await
            .map(NormalizedResult::Holdings),
        Command::Metrics => client
            .query_network_metrics(options)
            .await
            .map(NormalizedResult::Metrics),
    };

    ctrl_c.abort();
    // The sender went away with the options, so this drains and finishes
    let _ = advisories.await;

    match outcome {
        Ok(result) if cli.json => println!("{}", serde_json::to_string_pretty(&result)?),
        Ok(result) => println!("{}", result),
        Err(QueryError::Cancelled) => warn!("Query cancelled"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn print_advisory(event: &QueryEvent) {
    match event {
        QueryEvent::Congested {
            kind,
            failed_endpoints,
            retry_in: Some(delay),
            ..
        } => eprintln!(
            "Network congested: {} endpoints failed the {} query, retrying in {}s",
            failed_endpoints,
            kind,
            delay.as_secs()
        ),
        QueryEvent::Congested {
            kind, failed_endpoints, ..
        } => eprintln!(
            "Network congested: {} endpoints failed the {} query",
            failed_endpoints, kind
        ),
        QueryEvent::Retrying { kind, cycle } => info!("Retrying {} query (cycle {})", kind, cycle),
    }
}

fn init_logging(config: &QueryConfig) {
    let log_level = config
        .monitoring
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ledger_query={}", log_level).into());

    if config.monitoring.structured_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
