use std::sync::Arc;

use clap::{Parser, Subcommand};
use errwatch::{
    config::{AppConfig, NotifierKind},
    engine::ErrorAggregator,
    notification::{AdminNotifier, JsonNotifier, LogNotifier, Notifier, StdoutNotifier},
    relay::relay_lines,
};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `app.yaml`.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reads newline-delimited JSON error notifications from stdin and relays
    /// them to the operator.
    Run,
}

#[tokio::main]
#[tracing::instrument(level = "info")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run(cli.config_dir.as_deref()).await?,
    }

    Ok(())
}

async fn run(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(aggregator = ?config.aggregator, notifier = ?config.notifier, "Configuration loaded.");

    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Stdout => Arc::new(StdoutNotifier::new()),
        NotifierKind::Log => Arc::new(LogNotifier::new()),
        NotifierKind::Json => Arc::new(JsonNotifier::new()),
    };
    let aggregator = Arc::new(ErrorAggregator::new(config.aggregator.clone(), notifier));
    aggregator.start().await?;
    let admin = AdminNotifier::new(Arc::clone(&aggregator), config.client_id_fields.clone());

    let shutdown = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down...");
                shutdown.cancel();
            }
        }
    });

    let input = BufReader::new(tokio::io::stdin());
    let summary = relay_lines(input, &admin, shutdown).await;
    ctrl_c.abort();

    tracing::info!(relayed = summary.relayed, skipped = summary.skipped, "Input finished.");
    tracing::info!(stats = ?aggregator.stats(), "Final aggregator statistics.");
    aggregator.stop().await;
    Ok(())
}
