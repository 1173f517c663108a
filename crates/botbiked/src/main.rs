//! Bot bike daemon
//!
//! Simulated exercise bike: polls a metrics source for power and cadence and
//! reports them as stats events, so client apps can be tested without
//! hardware.

use anyhow::{Context, Result};
use botbike_common::TelemetryStats;
use botbiked::config::{self, BikeConfig};
use botbiked::metrics_source::{self, SourceState};
use botbiked::BotBikeClient;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "botbiked")]
#[command(about = "Bot bike - a simulated power/cadence sensor", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the metrics source and log every stats event
    Ride(Overrides),

    /// Run one refresh cycle and print the result as JSON
    Probe(Overrides),

    /// Serve a local metrics source
    Source {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        listen: String,

        /// Initial power (watts)
        #[arg(long, default_value_t = 100.0)]
        power: f64,

        /// Initial cadence (rpm)
        #[arg(long, default_value_t = 90.0)]
        cadence: f64,
    },
}

#[derive(Args)]
struct Overrides {
    #[arg(long)]
    power: Option<f64>,
    #[arg(long)]
    cadence: Option<f64>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Refresh period in seconds
    #[arg(long)]
    interval: Option<f64>,
}

impl Overrides {
    fn apply(self, mut config: BikeConfig) -> Result<BikeConfig> {
        if let Some(power) = self.power {
            config.power = power;
        }
        if let Some(cadence) = self.cadence {
            config.cadence = cadence;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ride(overrides) => {
            let config = overrides.apply(load(&cli.config)?)?;
            ride(config).await
        }
        Commands::Probe(overrides) => {
            let config = overrides.apply(load(&cli.config)?)?;
            probe(config).await
        }
        Commands::Source {
            listen,
            power,
            cadence,
        } => source(&listen, TelemetryStats::new(power, cadence)).await,
    }
}

fn load(path: &Path) -> Result<BikeConfig> {
    config::load_config(path).with_context(|| format!("Failed to load {}", path.display()))
}

async fn ride(config: BikeConfig) -> Result<()> {
    info!("Bot bike v{} starting", env!("CARGO_PKG_VERSION"));

    let client = BotBikeClient::with_http(config.client_options(), config.request_timeout())
        .context("Failed to create bot bike client")?;
    let mut stats = client.stats_channel();
    client.connect().context("Failed to start polling")?;

    loop {
        tokio::select! {
            Some(event) = stats.recv() => {
                info!("stats power={} cadence={}", event.power, event.cadence);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect();
    let counts = client.refresh_counts();
    info!(
        "Shutting down ({} cycles ok, {} failed)",
        counts.succeeded, counts.failed
    );
    Ok(())
}

async fn probe(config: BikeConfig) -> Result<()> {
    let client = BotBikeClient::with_http(config.client_options(), config.request_timeout())
        .context("Failed to create bot bike client")?;

    match client.refresh_now().await {
        Ok(stats) => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Err(e) => {
            warn!("Probe of {} failed", client.target());
            Err(e).context("Refresh cycle failed")
        }
    }
}

async fn source(listen: &str, initial: TelemetryStats) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    let state = Arc::new(SourceState::new(initial));

    tokio::select! {
        result = metrics_source::run(listener, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully");
            Ok(())
        }
    }
}
