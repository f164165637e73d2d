// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fencelock run <scenario>` - Execute a scenario file

use crate::output::{self, OutputFormat};
use crate::runner::Runner;
use crate::scenario::Scenario;
use anyhow::Result;
use clap::Args;
use fencelock_core::BrokerConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,

    /// Override the broker wait timeout (e.g. "50ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

pub fn handle(args: RunArgs, config: BrokerConfig) -> Result<()> {
    let config = match args.timeout {
        Some(timeout) => config.with_wait_timeout(timeout),
        None => config,
    };
    let scenario = Scenario::load(&args.scenario)?;
    tracing::info!(scenario = %args.scenario.display(), steps = scenario.steps.len(), "running scenario");

    let report = Runner::new(config).run(&scenario)?;
    output::print(&report, args.format);
    Ok(())
}
