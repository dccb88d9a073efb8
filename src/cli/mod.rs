//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ImportConfig, default_actor};
use crate::error::Result;
use crate::prune::DEFAULT_RETENTION_DAYS;

pub mod commands;

/// Immosync - Reconcile OpenImmo listing archives into a local listing store
#[derive(Parser, Debug)]
#[command(name = "immosync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: platform data dir, or IMMOSYNC_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "IMMOSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Project directory resource paths are relative to (default: cwd)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Upload directory below the project directory
    #[arg(long, global = true)]
    pub upload_dir: Option<String>,

    /// OpenImmo directory below the upload directory
    #[arg(long, global = true)]
    pub immo_dir: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Resource directory settings from flags and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory setting is invalid.
    pub fn import_config(&self) -> Result<ImportConfig> {
        ImportConfig::resolve(
            self.project_dir.as_deref(),
            self.upload_dir.as_deref(),
            self.immo_dir.as_deref(),
        )
    }

    /// Actor recorded in audit events.
    #[must_use]
    pub fn actor(&self) -> String {
        self.actor.clone().unwrap_or_else(default_actor)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the listing database
    Init {
        /// Recreate an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Import OpenImmo archives from a directory
    Import(ImportArgs),

    /// Delete resources of listings unpublished for too long
    Prune {
        /// Days a listing must have been unpublished
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
        retention_days: u32,
    },

    /// Manage recognized providers
    Provider {
        #[command(subcommand)]
        command: ProviderCommands,
    },

    /// Manage contact persons listings are assigned to
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Directory holding the `.zip` archives
    pub source_dir: PathBuf,

    /// Move processed archives here instead of deleting them
    #[arg(short, long)]
    pub backup_dir: Option<PathBuf>,

    /// Import at most this many archives
    #[arg(short, long, default_value_t = 1)]
    pub max_files: usize,
}

#[derive(Subcommand, Debug)]
pub enum ProviderCommands {
    /// Register or update a provider
    Add {
        /// OpenImmo provider number (`anbieternr`)
        key: String,

        /// Display name (defaults to the key)
        #[arg(long)]
        name: Option<String>,

        /// Register without enabling the import
        #[arg(long)]
        disabled: bool,
    },

    /// List providers
    List,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Register or update a provider's contact person
    Add {
        /// OpenImmo provider number (`anbieternr`)
        provider: String,

        /// Person number (`personennummer`) listings refer to
        external_id: String,

        #[arg(long, default_value = "")]
        salutation: String,

        #[arg(long, default_value = "")]
        firstname: String,

        #[arg(long, default_value = "")]
        lastname: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, default_value = "")]
        phone: String,
    },

    /// List agents
    List {
        /// Only agents of this provider
        provider: Option<String>,
    },
}
