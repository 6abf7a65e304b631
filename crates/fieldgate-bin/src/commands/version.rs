// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;
use crate::runtime::default_connectors;

/// Prints crate versions, the reader drivers compiled in and the
/// supported transports.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("Fieldgate {} ({}-{})", crate::VERSION, std::env::consts::OS, std::env::consts::ARCH);
    println!();
    for (name, version) in [
        ("fieldgate-core", fieldgate_core::VERSION),
        ("fieldgate-config", fieldgate_config::VERSION),
        ("fieldgate-store", fieldgate_store::VERSION),
        ("fieldgate-transport", fieldgate_transport::VERSION),
    ] {
        println!("  {:<20} {}", name, version);
    }
    println!();
    println!("Reader drivers: {}", default_connectors().drivers().join(", "));
    println!("Transports:     mqtt (v5), channel");
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");

    Ok(())
}
