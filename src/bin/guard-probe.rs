use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use dependency_guard::config::{load_config, GuardConfig};
use dependency_guard::lifecycle::{signals, Guard, Shutdown};
use dependency_guard::observability::{logging::init_logging, metrics::init_metrics};
use dependency_guard::{HealthReport, ServiceStatus};

#[derive(Parser)]
#[command(name = "guard-probe")]
#[command(about = "Evaluate dependency health checks and breaker states", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Evaluate once, print the JSON report and exit.
    #[arg(long)]
    once: bool,

    /// Override the polling interval in seconds.
    #[arg(short, long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Some(secs) = cli.interval {
        config.health.interval_secs = secs.max(1);
    }

    init_logging(&config.observability)?;
    tracing::info!("guard-probe v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let guard = Guard::from_config(config)?;

    if cli.once {
        let report = guard.monitor.evaluate().await;
        println!("{}", serde_json::to_string_pretty(&*report)?);
        if report.overall == ServiceStatus::Unavailable {
            std::process::exit(2);
        }
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let monitor_task = guard.spawn_monitor(&shutdown);
    let mut reports = guard.monitor.subscribe();

    let signal = signals::trigger_on_signal(&shutdown);
    tokio::pin!(signal);

    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = reports.borrow_and_update().clone();
                if let Some(report) = latest {
                    log_report(&report);
                }
            }
            _ = &mut signal => break,
        }
    }

    shutdown.trigger();
    monitor_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn log_report(report: &HealthReport) {
    tracing::info!(
        overall = %report.overall,
        services = report.services.len(),
        "Health report"
    );
    for service in report.unhealthy() {
        tracing::warn!(
            check = %service.name,
            status = %service.status,
            latency_ms = service.latency_ms,
            error = service.error.as_deref().unwrap_or(""),
            "Dependency not healthy"
        );
    }
}
