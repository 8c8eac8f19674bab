//! CLI entry point for the harbinger port monitor.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use harbinger_store::PresenceStore;

use harbinger_monitor::config::{LoggingConfig, MonitorConfig};
use harbinger_monitor::scheduler::Monitor;

#[derive(Parser)]
#[command(name = "harbinger")]
#[command(about = "Watches configured ports and reports hosts that were not there before")]
struct Cli {
    /// Configuration file (YAML, TOML or JSON).
    #[arg(short, long, default_value = "harbinger.yaml")]
    config: PathBuf,

    /// Run mode: cron (one pass) or standalone (daily scheduler).
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,

    /// Print the hosts recorded for one port as JSON lines and exit.
    #[arg(long, value_name = "PORT")]
    list_hosts: Option<u16>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Run a single pass and exit.
    Cron,
    /// Run a pass every day at `standalone.report_time`.
    Standalone,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = MonitorConfig::load(&cli.config)?;
    init_logging(&config.logging, cli.json)?;
    tracing::info!(
        config = %cli.config.display(),
        ports = config.ports.len(),
        "Configuration loaded"
    );

    let store = PresenceStore::open(&config.database)?;

    // Read-only: no tables are created for a listing.
    if let Some(port) = cli.list_hosts {
        for record in store.list(port)? {
            println!("{}", serde_json::to_string(&record)?);
        }
        return Ok(());
    }

    store.ensure_tables(&config.port_numbers())?;
    tracing::info!(database = %config.database.display(), "Presence store ready");

    let Some(mode) = cli.mode else {
        anyhow::bail!("Specify --mode cron (single pass) or --mode standalone (daily scheduler)");
    };

    let monitor = Monitor::new(config, Arc::new(store));

    match monitor.coordinator().scanner().verify_nmap().await {
        Some(version) => tracing::info!(nmap_version = %version, "Nmap verified"),
        None => tracing::warn!("nmap not found; nmap_scan profiles will fail"),
    }

    match mode {
        Mode::Cron => {
            monitor.run_batch().await;
        }
        Mode::Standalone => monitor.run_continuous().await?,
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let text_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let file_layer = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .init();
    Ok(())
}
