//! Command-line interface module for tidywatch.
//!
//! This module handles argument parsing and dispatches to the watch, sweep
//! and check commands.

use crate::config::{DEFAULT_CONFIG_PATH, OrganizerConfig};
use crate::file_organizer::{FileOrganizer, WatchMode};
use crate::logging::LogSink;
use crate::output::OutputFormatter;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Watch a directory and move new files into destinations by extension.
#[derive(Debug, Parser)]
#[command(name = "tidywatch", version, about)]
pub struct Cli {
    /// Configuration file (.json, or TOML for any other extension).
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Also append log events to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<OrganizeCommand>,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum OrganizeCommand {
    /// Sweep the source directory, then route new files until Ctrl+C (default).
    Watch {
        /// Poll every `sleep_time` seconds instead of using OS notifications.
        #[arg(long)]
        poll: bool,
        /// Do not sweep existing files before waiting for notifications.
        #[arg(long)]
        no_initial_sweep: bool,
    },
    /// Sweep the source directory once and exit.
    Sweep,
    /// Validate the configuration and print the routing rules.
    Check,
}

impl Default for OrganizeCommand {
    fn default() -> Self {
        Self::Watch {
            poll: false,
            no_initial_sweep: false,
        }
    }
}

/// Runs the given command against the configuration at `config_path`.
///
/// # Examples
///
/// ```no_run
/// use tidywatch::cli::{run_cli, OrganizeCommand};
/// use tidywatch::logging::LogSink;
/// use std::path::Path;
///
/// match run_cli(OrganizeCommand::Sweep, Path::new("config.json"), LogSink::current()) {
///     Ok(()) => println!("Done"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(
    command: OrganizeCommand,
    config_path: &Path,
    log: LogSink,
) -> Result<(), String> {
    match command {
        OrganizeCommand::Watch {
            poll,
            no_initial_sweep,
        } => {
            let organizer = load_organizer(config_path, log)?
                .with_initial_sweep(!no_initial_sweep)
                .with_watch_mode(if poll { WatchMode::Poll } else { WatchMode::Auto });
            OutputFormatter::info(&format!(
                "Watching {} (Ctrl+C to stop)",
                organizer
                    .config()
                    .map(|config| config.source_path().display().to_string())
                    .unwrap_or_default()
            ));
            organizer.start().map_err(|e| e.to_string())
        }
        OrganizeCommand::Sweep => {
            let organizer = load_organizer(config_path, log)?;
            let report = organizer.sweep_once().map_err(|e| e.to_string())?;
            OutputFormatter::sweep_summary(&report);
            if report.is_complete_success() {
                OutputFormatter::success("Sweep complete.");
            } else {
                OutputFormatter::warning(
                    "Some files were left in place; they will be retried on the next sweep.",
                );
            }
            Ok(())
        }
        OrganizeCommand::Check => check_config(config_path),
    }
}

/// Builds the organizer and turns an invalid status into an error.
fn load_organizer(config_path: &Path, log: LogSink) -> Result<FileOrganizer, String> {
    let organizer = FileOrganizer::new(config_path, log);
    if !organizer.status() {
        return Err(organizer.status_message().to_string());
    }

    let bootstrap = organizer.bootstrap_report();
    for path in &bootstrap.created {
        OutputFormatter::success(&format!("Created {}", path.display()));
    }
    for (path, reason) in &bootstrap.failed {
        OutputFormatter::error(&format!(
            "Could not create {} ({}); its rule is disabled",
            path.display(),
            reason
        ));
    }

    Ok(organizer)
}

/// Validates the configuration without touching the filesystem.
fn check_config(config_path: &Path) -> Result<(), String> {
    let config = OrganizerConfig::load(config_path).map_err(|e| e.to_string())?;

    OutputFormatter::info(&format!("Configuration: {}", config_path.display()));
    let source = config.source_path();
    if source.is_dir() {
        OutputFormatter::success(&format!("Source directory {}", source.display()));
    } else if config.source_dir.create {
        OutputFormatter::warning(&format!(
            "Source directory {} is missing and will be created",
            source.display()
        ));
    } else {
        OutputFormatter::error(&format!("Source directory {} does not exist", source.display()));
    }
    OutputFormatter::info(&format!("Idle tick: {}s", config.sleep_time));

    OutputFormatter::routing_table(&config.routing_table());

    if !config.ignore.is_empty() {
        OutputFormatter::header("IGNORED");
        for pattern in &config.ignore {
            println!("  {}", pattern);
        }
    }

    Ok(())
}
