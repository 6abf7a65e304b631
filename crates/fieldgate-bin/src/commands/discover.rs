// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `discover` command.

use std::sync::Arc;

use fieldgate_core::{wire, ConfigFetcher, ConnectionPool, ControllerAddress, DeviceCatalog, GatewayError};
use fieldgate_store::MemoryStore;
use tracing::info;

use crate::cli::{Cli, DiscoverArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::default_connectors;

/// Opens the configured readers, discovers controllers once and prints the
/// device snapshot as JSON on stdout.
pub async fn discover(cli: &Cli, args: DiscoverArgs) -> BinResult<()> {
    let config = fieldgate_config::load_config(&cli.config)?;

    let addresses: Vec<ControllerAddress> = if args.controllers.is_empty() {
        config.controllers.clone()
    } else {
        args.controllers.into_iter().map(ControllerAddress::from).collect()
    };
    if addresses.is_empty() {
        return Err(BinError::config(
            "No controllers to discover: pass --controller or set `controllers` in the config",
        ));
    }

    let pool = Arc::new(ConnectionPool::new(
        default_connectors(),
        config.polling.operation_timeout(),
    ));
    if pool.initialize(&config.readers).await == 0 {
        return Err(BinError::NoReaders {
            configured: config.readers.len(),
        });
    }

    let fetcher = ConfigFetcher::new(Arc::clone(&pool))
        .with_max_concurrent(config.polling.max_concurrent_controllers);
    let result = fetcher.fetch(&addresses).await;
    pool.shutdown().await;
    let devices = result.map_err(GatewayError::from)?;

    if args.save {
        let path = config
            .storage
            .catalog_path
            .as_ref()
            .ok_or_else(|| BinError::config("--save needs storage.catalog_path"))?;
        let store = MemoryStore::new()
            .with_catalog_file(path)
            .await
            .map_err(GatewayError::from)?;
        store
            .replace_devices(devices.clone())
            .await
            .map_err(GatewayError::from)?;
        info!(path = %path.display(), devices = devices.len(), "Catalog saved");
    }

    let rendered = serde_json::to_string_pretty(&wire::serialize_devices(&devices))
        .map_err(|e| BinError::runtime(format!("rendering devices: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
