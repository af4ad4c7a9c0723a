//! Packserve - a dev server that compiles, caches, and serves script bundles.

#![allow(dead_code)]

mod bundler;
mod cli;
mod config;
mod core;
mod hooks;
mod logger;
mod minify;
mod response;
mod utils;
mod worker;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{Config, init_config};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = init_config(Config::load(cli)?);

    match &cli.command {
        Commands::Build { .. } => cli::build::build_bundles(&config),
        Commands::Serve { .. } => cli::serve::serve(),
    }
}
