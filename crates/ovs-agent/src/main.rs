//! ovs-qos-agent entry point.
//!
//! Loads the configuration, resets the integration bridge pipeline and then
//! applies QoS policy events read as JSON lines from a file or stdin until
//! the input ends or SIGINT arrives.

use anyhow::Context;
use clap::Parser;
use ovs_agent::audit::{init_logging, init_logging_pretty};
use ovs_agent::audit_log;
use ovs_agent::daemon::read_events;
use ovs_agent::{
    AgentConfig, AgentDaemon, DaemonStats, LogFormat, QosDriver, QosExtension,
};
use ovs_bridge::{Cookie, DryRunBridge, DryRunUplink};
use ovs_types::PortNumber;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Open vSwitch QoS agent
#[derive(Parser, Debug)]
#[command(name = "ovs-qos-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Human-readable log output instead of JSON
    #[arg(long)]
    pretty: bool,

    /// JSON-lines file of policy events; stdin when omitted
    #[arg(short = 'e', long)]
    events: Option<PathBuf>,

    /// Events buffered between the reader and the daemon
    #[arg(long, default_value = "128")]
    queue_depth: usize,
}

fn load_config(args: &Args) -> anyhow::Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => AgentConfig::default(),
    };
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if args.pretty {
        config.log_format = LogFormat::Pretty;
    }
    Ok(config)
}

/// Without a switch connection the bridges run in dry-run mode and log the
/// calls they would make.
fn build_driver(config: &AgentConfig) -> QosDriver<DryRunBridge> {
    let bridge = config.ports.iter().fold(
        DryRunBridge::new(&config.integration_bridge, Cookie::new(config.cookie)),
        |bridge, (name, ofport)| bridge.with_port(name, PortNumber::new(*ofport)),
    );
    let mut driver = QosDriver::new(bridge, config.table_options());
    for physical in &config.physical_bridges {
        driver.add_uplink(Box::new(DryRunUplink::new(
            &physical.name,
            physical.ports.clone(),
        )));
    }
    driver
}

async fn run(args: &Args, config: AgentConfig) -> anyhow::Result<DaemonStats> {
    let mut daemon = AgentDaemon::new();
    daemon.register_extension(Box::new(QosExtension::new(build_driver(&config))));
    daemon
        .init()
        .await
        .context("failed to initialize the integration bridge")?;

    let (tx, rx) = mpsc::channel(args.queue_depth.max(1));
    let reader = match &args.events {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            tokio::spawn(read_events(BufReader::new(file), tx))
        }
        None => tokio::spawn(read_events(BufReader::new(tokio::io::stdin()), tx)),
    };

    let stop = daemon.stop_handle();
    let signal = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received SIGINT, shutting down gracefully...");
                stop.notify_one();
            }
            Err(err) => error!("Failed to listen for ctrl-c: {}", err),
        }
    });

    let stats = daemon.run(rx).await;
    signal.abort();
    reader.abort();
    match reader.await {
        Ok(Ok(sent)) => debug!(sent, "event reader finished"),
        Ok(Err(err)) => warn!(error = %err, "event reader failed"),
        Err(_) => {}
    }

    for line in daemon.dump() {
        debug!("{}", line);
    }
    Ok(stats)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ovs-qos-agent: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match config.log_format {
        LogFormat::Json => init_logging(&config.log_level),
        LogFormat::Pretty => init_logging_pretty(&config.log_level),
    }

    info!(
        integration_bridge = %config.integration_bridge,
        physical_bridges = config.physical_bridges.len(),
        dhcp = config.enable_openflow_dhcp,
        dhcpv6 = config.enable_dhcpv6,
        "Starting ovs-qos-agent"
    );
    audit_log!(config.audit_record(args.config.as_deref()));

    match run(&args, config).await {
        Ok(stats) => {
            info!(
                processed = stats.events_processed,
                failed = stats.events_failed,
                "ovs-qos-agent shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
