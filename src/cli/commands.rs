//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::oam::split_file_list;

/// oam-ecs - Deploy OAM applications to Amazon ECS.
#[derive(Parser, Debug)]
#[command(name = "oam-ecs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// AWS region, overriding `AWS_REGION` and the profile.
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy every component instance of an application.
    Apply {
        /// OAM files to load.
        #[command(flatten)]
        files: FileArgs,

        /// Write the generated templates locally instead of deploying them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect or remove a deployed application.
    App {
        /// Application subcommand.
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Manage the shared environment.
    Env {
        /// Environment subcommand.
        #[command(subcommand)]
        command: EnvCommands,
    },
}

/// Application subcommands.
#[derive(Subcommand, Debug)]
pub enum AppCommands {
    /// Show the stacks of every component instance.
    Show {
        /// OAM files holding the application configuration.
        #[command(flatten)]
        files: FileArgs,
    },

    /// Delete the stacks of every component instance.
    Delete {
        /// OAM files holding the application configuration.
        #[command(flatten)]
        files: FileArgs,
    },
}

/// Environment subcommands.
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum EnvCommands {
    /// Create or update the environment.
    Deploy,
    /// Show the environment.
    Show,
    /// Delete the environment.
    Delete,
}

/// A repeatable, comma separated list of OAM files.
#[derive(Args, Debug, Clone)]
pub struct FileArgs {
    /// OAM file(s); repeat the flag or separate paths with commas.
    #[arg(short = 'f', long = "filename", required = true)]
    pub files: Vec<String>,
}

impl FileArgs {
    /// Returns every path given, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .flat_map(|list| split_file_list(list))
            .collect()
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
