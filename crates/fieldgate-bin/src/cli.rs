// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start the gateway (default)
//! - `validate`: Validate the configuration file
//! - `version`: Show version information
//! - `discover`: Run discovery once and print the result

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Fieldgate - building-automation field gateway
///
/// Polls controllers on the device network through a pool of readers and
/// answers configuration and publish requests from the cloud side.
#[derive(Parser, Debug)]
#[command(
    name = "fieldgate",
    author = "Sylvex <contact@sylvex.io>",
    version = fieldgate_core::VERSION,
    about = "Building-automation field gateway",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "fieldgate.yaml",
        env = "FIELDGATE_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "FIELDGATE_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "FIELDGATE_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the gateway
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration without starting the gateway.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,

    /// Discover the configured controllers once and print the result as JSON
    Discover(DiscoverArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Skip discovery of configured controllers on startup
    #[arg(long)]
    pub skip_discovery: bool,

    /// Disable the periodic poll cycle
    #[arg(long)]
    pub no_poll: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `discover` command.
#[derive(Args, Debug, Default, Clone)]
pub struct DiscoverArgs {
    /// Controller address to discover; repeatable. Defaults to the configured list
    #[arg(long = "controller", value_name = "ADDRESS")]
    pub controllers: Vec<String>,

    /// Save the result to the configured catalog file
    #[arg(long)]
    pub save: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<fieldgate_config::LogFormat> for LogFormat {
    fn from(format: fieldgate_config::LogFormat) -> Self {
        match format {
            fieldgate_config::LogFormat::Text => LogFormat::Text,
            fieldgate_config::LogFormat::Json => LogFormat::Json,
            fieldgate_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Get the effective log level.
    ///
    /// `--quiet` and `--verbose` win, then `--log-level`, then the config
    /// file, then `info`.
    pub fn effective_log_level(&self) -> String {
        if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else if let Some(level) = &self.log_level {
            level.clone()
        } else {
            self.file_logging()
                .map(|logging| logging.level.as_str().to_string())
                .unwrap_or_else(|| "info".to_string())
        }
    }

    /// Get the effective log format: `--log-format`, then the config file.
    pub fn effective_log_format(&self) -> LogFormat {
        self.log_format
            .or_else(|| self.file_logging().map(|logging| logging.format.into()))
            .unwrap_or_default()
    }

    // Logging is set up before commands run, so a broken file is reported
    // later by the command itself.
    fn file_logging(&self) -> Option<fieldgate_config::LoggingConfig> {
        if !self.config.exists() {
            return None;
        }
        fieldgate_config::load_config(&self.config)
            .ok()
            .map(|config| config.logging)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: &str = "/nonexistent/fieldgate.yaml";

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["fieldgate"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::parse_from(["fieldgate", "run", "--skip-discovery", "--no-poll"]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert!(args.skip_discovery);
        assert!(args.no_poll);
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["fieldgate", "validate", "--format", "json", "--strict"]);
        let Some(Commands::Validate(args)) = cli.command else {
            panic!("Expected Validate command");
        };
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.strict);
    }

    #[test]
    fn test_discover_controllers() {
        let cli = Cli::parse_from([
            "fieldgate",
            "discover",
            "--controller",
            "192.168.1.10",
            "--controller",
            "192.168.1.11",
        ]);
        let Some(Commands::Discover(args)) = cli.command else {
            panic!("Expected Discover command");
        };
        assert_eq!(args.controllers, vec!["192.168.1.10", "192.168.1.11"]);
        assert!(!args.save);
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["fieldgate", "-c", "/etc/fieldgate/site.toml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/fieldgate/site.toml"));
    }

    #[test]
    fn test_log_level_flag() {
        let cli = Cli::parse_from(["fieldgate", "-c", MISSING, "-l", "debug"]);
        assert_eq!(cli.effective_log_level(), "debug");
    }

    #[test]
    fn test_quiet_beats_log_level() {
        let cli = Cli::parse_from(["fieldgate", "-c", MISSING, "-q", "-l", "trace"]);
        assert_eq!(cli.effective_log_level(), "warn");
    }

    #[test]
    fn test_log_level_falls_back_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldgate.toml");
        std::fs::write(
            &path,
            "[gateway]\nid = \"gw\"\n\n[logging]\nlevel = \"error\"\nformat = \"json\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from(["fieldgate", "-c", path.to_str().unwrap()]);
        if cli.log_level.is_none() && cli.log_format.is_none() {
            assert_eq!(cli.effective_log_level(), "error");
            assert_eq!(cli.effective_log_format(), LogFormat::Json);
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        let cli = Cli::parse_from(["fieldgate", "-c", MISSING]);
        if cli.log_level.is_none() {
            assert_eq!(cli.effective_log_level(), "info");
        }
        if cli.log_format.is_none() {
            assert_eq!(cli.effective_log_format(), LogFormat::Text);
        }
    }
}
