//! Telecom Health & Recovery Monitor
//!
//! Probes SIP, HTTP and TCP services on independent fixed cadences, tracks
//! their health with hysteresis and optionally runs recovery actions.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────── MONITOR ─────────────────────────────┐
//!   │                                                                  │
//!   │  per service task:                                               │
//!   │  ┌─────────┐   ┌─────────┐   ┌──────────────┐   ┌────────────┐  │
//!   │  │scheduler│──▶│  probe  │──▶│ health state │──▶│  recovery  │  │
//!   │  │  tick   │   │sip/http/│   │   machine    │   │orchestrator│  │
//!   │  └─────────┘   │  tcp    │   └──────┬───────┘   └─────┬──────┘  │
//!   │                └─────────┘          │                 │         │
//!   │                                     ▼                 ▼         │
//!   │                        ┌───────────────────┐  ┌──────────────┐  │
//!   │                        │ incident recorder │  │   metrics    │  │
//!   │                        └───────────────────┘  └──────────────┘  │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use telecom_monitor::lifecycle::{signals, startup, MonitorOptions, Shutdown};
use telecom_monitor::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "telecom-monitor", version, about = "Telecom service health and recovery monitor")]
struct Cli {
    /// Path to the configuration file (TOML, or JSON for .json paths)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Run recovery actions when a service becomes unhealthy
    #[arg(long)]
    auto_recover: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let options = MonitorOptions {
        auto_recover: cli.auto_recover,
        verbose: cli.verbose,
        config_path: cli.config.clone(),
    };

    let config = match startup::load(&options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("telecom-monitor: {}", e);
            std::process::exit(2);
        }
    };

    if cli.check_config {
        println!(
            "{}: configuration OK, {} service(s)",
            options.config_path.display(),
            config.services.len()
        );
        for spec in &config.services {
            println!(
                "  {} [{}] {} every {:?}, timeout {:?}, action {}",
                spec.name,
                spec.protocol,
                spec.target,
                spec.interval,
                spec.timeout,
                spec.recovery.action.kind()
            );
        }
        return Ok(());
    }

    let observability = &config.settings.observability;
    logging::init_logging(
        &observability.log_level,
        options.verbose,
        cli.json_logs || observability.json_logs,
    )?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %options.config_path.display(),
        services = config.services.len(),
        auto_recover = options.auto_recover,
        "telecom-monitor starting"
    );

    if observability.metrics_enabled {
        let addr: SocketAddr = observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let monitor = startup::prepare(&config, &options)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    monitor.run(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
