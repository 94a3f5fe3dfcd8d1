//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Notify command arguments.
#[derive(Debug, Args)]
pub struct NotifyCommand {
    /// Raw push payload JSON, delivered as-is
    #[arg(short, long, conflicts_with_all = ["title", "body"])]
    pub payload: Option<String>,

    /// Notification title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Notification body text
    #[arg(short, long)]
    pub body: Option<String>,
}

/// Cache management commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// List cache versions and their resource counts
    List,

    /// Delete caches
    Clear {
        /// Only delete caches other than the current version
        #[arg(long)]
        stale: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
