//! `xerodb` command-line entry point.
//!
//! # Responsibility
//! - Parse flags and environment into [`config::Args`].
//! - Start file logging, then dispatch the requested command.

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    let cwd = std::env::current_dir().context("resolve current directory")?;
    let log_dir = args.log_dir(&cwd);
    xerodb_core::init_logging(args.log_level(), &log_dir.to_string_lossy())
        .with_context(|| format!("start logging in `{}`", log_dir.display()))?;

    commands::run(&args)
}
