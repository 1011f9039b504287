//! Command-line configuration.
//!
//! Options come from CLI arguments with environment fallbacks:
//! - `--mmap` / `RESARC_MMAP`: memory-map archive files instead of reading them
//! - `--no-verify` / `RESARC_NO_VERIFY`: skip the entry table checksum
//!
//! Log filtering is controlled by `RUST_LOG`.

use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use resarc_archive::{ArchiveOptions, LoadStrategy};

/// Top-level configuration parsed from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "resarc",
    about = "Inspect and extract content-addressed resource archives",
    version
)]
pub struct Config {
    /// Memory-map archive files instead of reading them into memory
    #[arg(
        long,
        global = true,
        env = "RESARC_MMAP",
        value_parser = BoolishValueParser::new()
    )]
    pub mmap: bool,

    /// Skip verification of the entry table checksum
    #[arg(
        long,
        global = true,
        env = "RESARC_NO_VERIFY",
        value_parser = BoolishValueParser::new()
    )]
    pub no_verify: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show header fields, entry count and data size
    Info {
        /// Path to the index file (.arci)
        index: PathBuf,
    },
    /// List every entry with its offset, sizes and flags
    List {
        /// Path to the index file (.arci)
        index: PathBuf,
    },
    /// Extract one entry by its hex hash
    Extract {
        /// Path to the index file (.arci)
        index: PathBuf,
        /// Entry hash as 40 hex characters
        hash: String,
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read every entry and report failures
    Verify {
        /// Path to the index file (.arci)
        index: PathBuf,
    },
}

impl Config {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Archive options derived from the global flags
    pub fn archive_options(&self) -> ArchiveOptions {
        let strategy = if self.mmap {
            LoadStrategy::Mmap
        } else {
            LoadStrategy::Read
        };

        ArchiveOptions::new()
            .with_load_strategy(strategy)
            .with_checksum_verification(!self.no_verify)
    }

    /// Index path named by the subcommand
    pub fn index_path(&self) -> &Path {
        match &self.command {
            Command::Info { index }
            | Command::List { index }
            | Command::Extract { index, .. }
            | Command::Verify { index } => index,
        }
    }
}
