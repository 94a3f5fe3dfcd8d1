//! Command-line interface for apetite.
//!
//! This module provides the CLI structure and command handlers for the
//! `apetite` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{CacheCommand, ConfigCommand, NotifyCommand, StatusCommand};

/// apetite - Offline cache and push notifications for Meu Apetite
///
/// Runs the service-worker runtime that keeps the app shell cached for
/// offline use and turns push events into notifications and alert sounds.
#[derive(Debug, Parser)]
#[command(name = "apetite")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the worker runtime until interrupted
    Run,

    /// Show worker and storage status
    Status(StatusCommand),

    /// Send a test push through the notification pipeline
    Notify(NotifyCommand),

    /// Inspect or evict resource caches
    #[command(subcommand)]
    Cache(CacheCommand),

    /// View or modify configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> apetite_worker::logging::Verbosity {
        if self.quiet {
            apetite_worker::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => apetite_worker::logging::Verbosity::Normal,
                1 => apetite_worker::logging::Verbosity::Verbose,
                _ => apetite_worker::logging::Verbosity::Trace,
            }
        }
    }
}
