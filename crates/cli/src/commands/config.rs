// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fencelock config` - Show the effective broker config

use anyhow::Result;
use clap::Args;
use fencelock_core::BrokerConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Only check the config, print nothing
    #[arg(long)]
    pub check: bool,
}

pub fn handle(args: ConfigArgs, config: BrokerConfig) -> Result<()> {
    if !args.check {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}
