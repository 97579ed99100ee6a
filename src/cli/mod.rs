//! CLI module for DeployMate
//!
//! Argument parsing for the `deploymate` binary.

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// DeployMate - apply a playbook to the hosts of an inventory over SSH
#[derive(Parser, Debug, Clone)]
#[command(name = "deploymate")]
#[command(version)]
#[command(about = "Minimal declarative remote configuration over SSH", long_about = None)]
pub struct Cli {
    /// Path to the playbook file
    pub playbook: PathBuf,

    /// Path to the inventory file
    pub inventory: PathBuf,

    /// Verbosity level (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Directory relative key files resolve against
    #[arg(long, value_name = "DIR")]
    pub key_dir: Option<PathBuf>,

    /// Directory relative upload sources resolve against
    #[arg(long, value_name = "DIR")]
    pub files_dir: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-2)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(2)
    }

    /// Default log filter for the verbosity level
    pub fn log_level(&self) -> &'static str {
        match self.verbosity() {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Both input documents must exist and be regular files
    pub fn validate_inputs(&self) -> Result<()> {
        validate_file(&self.playbook)?;
        validate_file(&self.inventory)
    }
}

/// Fails with [`Error::FileNotFound`] unless `path` is a regular file
pub fn validate_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::FileNotFound(path.to_path_buf()))
    }
}
