// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use fieldgate_config::{FieldgateConfig, TransportKind};
use fieldgate_core::simulated::SIMULATED_DRIVER;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Loads and validates the configuration file, then prints a summary and
/// any warnings.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    if !config_path.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = fieldgate_config::load_config(config_path)
        .map_err(|e| BinError::from(e).with_context("Configuration validation failed"))?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Gateway ID:   {}", config.gateway.id);
            println!("  Gateway Name: {}", config.gateway.name);
            println!("  Readers:      {}", config.readers.len());
            println!("  Controllers:  {}", config.controllers.len());
            println!("  Transport:    {:?}", config.transport.kind);
            println!("  Requests:     {}/+", config.request_topic());
            println!("  Responses:    {}", config.response_topic());
            if config.polling.enabled {
                println!("  Polling:      every {} ms", config.polling.interval_ms);
            } else {
                println!("  Polling:      disabled");
            }

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "gateway_id": config.gateway.id,
                    "gateway_name": config.gateway.name,
                    "readers": config.readers.len(),
                    "controllers": config.controllers.len(),
                    "request_topic": config.request_topic(),
                    "response_topic": config.response_topic(),
                    "polling_enabled": config.polling.enabled,
                    "poll_interval_ms": config.polling.interval_ms,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let rendered = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("rendering validation result: {}", e)))?;
            println!("{}", rendered);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Returns non-fatal findings for a configuration that already validated.
pub(crate) fn collect_warnings(config: &FieldgateConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.readers.is_empty() {
        warnings.push("No readers configured; the pool stays empty until a fetch-config request".to_string());
    } else if config.readers.iter().all(|r| !r.active) {
        warnings.push("Every configured reader is inactive".to_string());
    }

    for reader in &config.readers {
        if reader.driver != SIMULATED_DRIVER {
            warnings.push(format!(
                "Reader '{}' uses driver '{}', which this build has no connector for",
                reader.id, reader.driver
            ));
        }
    }

    if !config.controllers.is_empty() && config.readers.is_empty() {
        warnings.push("Controllers are configured but startup discovery has no readers".to_string());
    }

    if config.polling.enabled && config.upload.points_url.is_none() {
        warnings.push(
            "Polling is enabled but upload.points_url is not set; publish requests must carry a URL"
                .to_string(),
        );
    }

    if let Some(parent) = config
        .storage
        .catalog_path
        .as_deref()
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
    {
        if !parent.exists() {
            warnings.push(format!("Catalog directory does not exist: {}", parent.display()));
        }
    }

    if config.transport.kind == TransportKind::Channel {
        warnings.push("Channel transport accepts no requests from outside the process".to_string());
    }

    warnings
}
