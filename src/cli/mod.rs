//! CLI module for plmcore
//!
//! Provides command-line access to a catalog file:
//! - init: create a catalog from a configuration
//! - lifecycles: list configured lifecycles
//! - children / parents: BOM queries
//! - promote / demote / promote-assembly / approve: governance actions
//! - check: promotability report

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Action, BomQuery, Cli, Command};
pub use commands::{
    approve, bom, check, demote, init, lifecycles, promote, promote_assembly, run_command,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{render_response, write_response};

use crate::config::{LoggingConfig, PlmConfig};
use crate::observability::init_logging;

/// Parse arguments, install logging and run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let logging = match &cli.command {
        Command::Init { config, .. } | Command::Lifecycles { config } => PlmConfig::load(config)
            .map(|c| c.logging)
            .unwrap_or_default(),
        _ => LoggingConfig::default(),
    };
    init_logging(&logging);
    run_command(cli.command)
}
