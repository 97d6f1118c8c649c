use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "keel", about = "Keel modular application host", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, validate, and start every configured module
    Run {
        /// JSON configuration document
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Discovery root; repeatable, appended to the configured set
        #[arg(long = "modules-dir", value_name = "DIR")]
        modules_dirs: Vec<PathBuf>,

        /// Failure policy override: fail-fast or continue
        #[arg(long, value_name = "POLICY")]
        policy: Option<String>,
    },
    /// Validate the module graph and exit without loading anything
    Check {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long = "modules-dir", value_name = "DIR")]
        modules_dirs: Vec<PathBuf>,
    },
}
