// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fencelock - fence and lock-broker scenario runner

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod commands;
mod output;
mod runner;
mod scenario;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{config, run};
use fencelock_core::BrokerConfig;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "fencelock",
    version,
    about = "fencelock - buffer fences and multi-object lock broker"
)]
struct Cli {
    /// Broker config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective broker config
    Config(config::ConfigArgs),
    /// Run a scenario file against a fresh broker
    Run(run::RunArgs),
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let broker_config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config(args) => config::handle(args, broker_config),
        Commands::Run(args) => run::handle(args, broker_config),
    }
}

fn load_config(path: Option<&Path>) -> Result<BrokerConfig> {
    match path {
        Some(path) => Ok(BrokerConfig::load(path)?),
        None => Ok(BrokerConfig::default()),
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env("FENCELOCK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
