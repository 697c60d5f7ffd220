mod cli;
mod commands;
mod compiler;
mod drivers;
mod manifest;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // Callbacks scheduled by resources run on this runtime
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let state_dir = cli.state_dir.as_deref();

    match cli.command {
        Command::Plan { manifest } => {
            runtime.block_on(commands::plan::run(&ctx, &manifest, state_dir))
        }
        Command::Deploy { manifest, yes } => {
            runtime.block_on(commands::deploy::run(&ctx, &manifest, state_dir, yes))
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tutti-frutti", &mut io::stdout());
            Ok(())
        }
    }
}
