// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::RuntimeBuilder;

/// Starts the gateway and runs it until a shutdown signal.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    info!(config = %cli.config.display(), "Starting Fieldgate gateway");

    RuntimeBuilder::new()
        .config_path(&cli.config)
        .skip_discovery(args.skip_discovery)
        .no_poll(args.no_poll)
        .build()?
        .run()
        .await
}
