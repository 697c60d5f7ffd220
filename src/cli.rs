use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tutti-frutti")]
#[command(author = "tutti-frutti contributors")]
#[command(version)]
#[command(about = "Declare resources, diff them against what is deployed, and reconcile", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding the state of the built-in classes
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the steps needed to reconcile the manifest
    Plan {
        /// Manifest file, or a directory containing tutti-frutti.toml
        #[arg(default_value = ".")]
        manifest: PathBuf,
    },

    /// Reconcile the live state with the manifest
    Deploy {
        /// Manifest file, or a directory containing tutti-frutti.toml
        #[arg(default_value = ".")]
        manifest: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
