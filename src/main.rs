//! tilgin-restart - Tilgin router restart tool
//!
//! Logs into the router web interface, submits a restart and waits for the
//! router to go down and come back up. One run per invocation.

mod config;
mod error;
mod tilgin;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Cli, Config};
use crate::error::AppError;
use crate::tilgin::{Protocol, RestartReport, Sequencer};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(&cli);

    // Initialize tracing
    let debug = config.as_ref().map(|c| c.debug).unwrap_or(cli.debug);
    init_tracing(debug);

    match run(config).await {
        Ok(report) => {
            tracing::info!(downtime = ?report.downtime, "Router restarted");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Failed to restart");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "tilgin_restart=debug"
    } else {
        "tilgin_restart=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if debug {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

async fn run(config: Result<Config, AppError>) -> anyhow::Result<RestartReport> {
    let config = config.context("failed to load configuration")?;
    let session = config.session()?;
    let policy = config.liveness_policy()?;
    tracing::info!(
        host = %session.router_host,
        user = %session.username,
        variant = config.variant.as_str(),
        "Configuration loaded"
    );

    let mut sequencer = Sequencer::initialize_session(session, Protocol::for_variant(config.variant), policy)?;
    let result = sequencer.run().await;
    tracing::debug!(state = ?sequencer.state(), "Sequence finished");

    Ok(result?)
}
