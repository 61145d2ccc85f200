//! CLI argument definitions using clap
//!
//! Commands:
//! - plmcore init --config <path> --catalog <path>
//! - plmcore lifecycles --config <path>
//! - plmcore children|parents --catalog <path> --object <id>
//! - plmcore promote|demote|promote-assembly|approve --catalog <path> --object <id> --user <name>
//! - plmcore check --catalog <path> --object <id>

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::ObjectId;

/// plmcore - lifecycle governance for parts, documents and assemblies
#[derive(Parser, Debug)]
#[command(name = "plmcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by the BOM queries.
#[derive(Args, Debug, Clone)]
pub struct BomQuery {
    /// Path to the catalog file
    #[arg(long, default_value = "./catalog.json")]
    pub catalog: PathBuf,

    /// Root object id
    #[arg(long)]
    pub object: ObjectId,

    /// Levels to walk, -1 for all of them
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub depth: i32,

    /// Links valid at this RFC 3339 instant instead of the current ones
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,

    /// Only keep official objects
    #[arg(long)]
    pub official_only: bool,
}

/// Options shared by the governance actions.
#[derive(Args, Debug, Clone)]
pub struct Action {
    /// Path to the catalog file
    #[arg(long, default_value = "./catalog.json")]
    pub catalog: PathBuf,

    /// Object id
    #[arg(long)]
    pub object: ObjectId,

    /// Username of the acting user
    #[arg(long)]
    pub user: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a catalog with the configured lifecycles
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./plm.json")]
        config: PathBuf,

        /// Path of the catalog file to create
        #[arg(long, default_value = "./catalog.json")]
        catalog: PathBuf,
    },

    /// Print the configured lifecycles
    Lifecycles {
        /// Path to configuration file
        #[arg(long, default_value = "./plm.json")]
        config: PathBuf,
    },

    /// Walk the BOM downwards
    Children(BomQuery),

    /// Walk the BOM upwards
    Parents(BomQuery),

    /// Promote one object
    Promote(Action),

    /// Demote one object
    Demote(Action),

    /// Promote a part and its children atomically
    PromoteAssembly(Action),

    /// Record an approval for the pending promotion
    Approve(Action),

    /// Print whether an object is promotable, and why not
    Check {
        /// Path to the catalog file
        #[arg(long, default_value = "./catalog.json")]
        catalog: PathBuf,

        /// Object id
        #[arg(long)]
        object: ObjectId,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
