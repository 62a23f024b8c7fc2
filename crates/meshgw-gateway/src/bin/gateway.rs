//! Binary entry point (§6 configuration surface, §9).
//!
//! Builds every component via [`meshgw_gateway::build`] against an
//! [`InMemorySinkBus`] — a stand-in for the real local system-bus binding,
//! which is an external collaborator out of scope for this workspace (§1).
//! A deployment wiring a real bus swaps that one line and nothing else.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use meshgw_gateway::GatewayConfig;
use meshgw_sinkbus::InMemorySinkBus;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meshgw-gateway", about = "Mesh network gateway transport")]
struct Cli {
    /// Path to the TOML configuration file (§6).
    #[arg(long)]
    config: PathBuf,

    /// Overrides `RUST_LOG` for this run.
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(log_level: Option<&str>) {
    let filter = log_level
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = match GatewayConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, path = %cli.config.display(), "failed to load configuration");
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start the async runtime");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: GatewayConfig) -> ExitCode {
    // The real system-bus binding is an external collaborator (§1); this
    // in-memory one never gains sinks on its own, so a deployment wanting
    // actual mesh traffic must supply its own `SinkBus` here.
    let bus = Arc::new(InMemorySinkBus::new());

    let (transport, handles) = match meshgw_gateway::build(&config, bus) {
        Ok(built) => built,
        Err(err) => {
            tracing::error!(error = %err, "configuration validation failed");
            return ExitCode::from(1);
        }
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::select! {
        result = transport.run() => {
            handles.abort_all();
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    tracing::error!(error = %err, "transport worker exited fatally");
                    ExitCode::from(1)
                }
            }
        }
        _ = shutdown => {
            tracing::info!("shutdown requested, stopping gateway");
            handles.abort_all();
            ExitCode::SUCCESS
        }
    }
}
