//! CLI module for the oam-ecs deployment tool.
//!
//! This module provides the command-line interface for deploying OAM
//! applications and the shared environment.

mod commands;
mod output;

pub use commands::{AppCommands, Cli, Commands, EnvCommands, FileArgs, OutputFormat};
pub use output::{OutputFormatter, humanize};
