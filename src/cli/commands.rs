//! CLI command implementations
//!
//! Every command is a short-lived process: it loads the catalog file,
//! runs one operation through `PlmService`, writes the catalog back when
//! the operation changed it, and prints the result as JSON.

use std::path::Path;

use serde_json::{json, Value};

use crate::bom::BomEntry;
use crate::catalog::{CatalogFile, ObjectId, UserId};
use crate::config::PlmConfig;
use crate::promotion::ApprovalOutcome;
use crate::service::PlmService;

use super::args::{Action, BomQuery, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Run a command and print its output
pub fn run_command(command: Command) -> CliResult<()> {
    let output = match command {
        Command::Init { config, catalog } => init(&config, &catalog)?,
        Command::Lifecycles { config } => lifecycles(&config)?,
        Command::Children(query) => bom(&query, false)?,
        Command::Parents(query) => bom(&query, true)?,
        Command::Promote(action) => promote(&action)?,
        Command::Demote(action) => demote(&action)?,
        Command::PromoteAssembly(action) => promote_assembly(&action)?,
        Command::Approve(action) => approve(&action)?,
        Command::Check { catalog, object } => check(&catalog, object)?,
    };
    write_response(output)
}

fn open(path: &Path) -> CliResult<(CatalogFile, PlmService)> {
    let file = CatalogFile::new(path);
    let catalog = file.load()?;
    Ok((file, PlmService::new(catalog)))
}

/// Create a catalog file seeded from the configuration
pub fn init(config_path: &Path, catalog_path: &Path) -> CliResult<Value> {
    let config = PlmConfig::load(config_path)?;
    let file = CatalogFile::new(catalog_path);
    if file.exists() {
        return Err(CliError::already_initialized(catalog_path.display()));
    }
    let service = PlmService::from_config(&config)?;
    file.save(&service.snapshot())?;
    tracing::info!(catalog = %catalog_path.display(), "catalog initialized");
    Ok(json!({
        "catalog": catalog_path.display().to_string(),
        "company": config.company_username,
        "default_lifecycle": config.default_lifecycle,
    }))
}

/// The configured lifecycles
pub fn lifecycles(config_path: &Path) -> CliResult<Value> {
    let config = PlmConfig::load(config_path)?;
    let definitions = config.definitions()?;
    Ok(json!({
        "default_lifecycle": config.default_lifecycle,
        "lifecycles": definitions,
    }))
}

/// Children or parents of an object
pub fn bom(query: &BomQuery, parents: bool) -> CliResult<Value> {
    let (_, service) = open(&query.catalog)?;
    let entries: Vec<BomEntry> = if parents {
        service.get_parents(query.object, query.depth, query.as_of, query.official_only)?
    } else {
        service.get_children(query.object, query.depth, query.as_of, query.official_only)?
    };
    Ok(json!({ "object": query.object, "entries": entries }))
}

/// Run one governance action and persist the result
fn act<T>(
    action: &Action,
    op: impl FnOnce(&PlmService, ObjectId, UserId) -> CliResult<T>,
) -> CliResult<T> {
    let (file, service) = open(&action.catalog)?;
    let user = service.user_id(&action.user)?;
    let result = op(&service, action.object, user)?;
    file.save(&service.snapshot())?;
    Ok(result)
}

pub fn promote(action: &Action) -> CliResult<Value> {
    let state = act(action, |service, object, user| Ok(service.promote(object, user)?))?;
    Ok(json!({ "object": action.object, "state": state }))
}

pub fn demote(action: &Action) -> CliResult<Value> {
    let state = act(action, |service, object, user| Ok(service.demote(object, user)?))?;
    Ok(json!({ "object": action.object, "state": state }))
}

pub fn promote_assembly(action: &Action) -> CliResult<Value> {
    let promoted = act(action, |service, object, user| {
        Ok(service.promote_assembly(object, user)?)
    })?;
    Ok(json!({ "root": action.object, "promoted": promoted }))
}

pub fn approve(action: &Action) -> CliResult<Value> {
    let outcome = act(action, |service, object, user| {
        Ok(service.record_approval(object, user)?)
    })?;
    Ok(match outcome {
        ApprovalOutcome::Recorded { signers } => json!({
            "object": action.object,
            "outcome": "recorded",
            "signers": signers,
        }),
        ApprovalOutcome::Promoted { signers, state } => json!({
            "object": action.object,
            "outcome": "promoted",
            "signers": signers,
            "state": state,
        }),
    })
}

/// Promotability of an object and the reasons it is blocked
pub fn check(catalog_path: &Path, object: ObjectId) -> CliResult<Value> {
    let (_, service) = open(catalog_path)?;
    let blockers = service.promotion_blockers(object)?;
    let promotable = service.is_promotable(object)?;
    let snapshot = service.snapshot();
    let current = snapshot.object(object)?;
    Ok(json!({
        "object": object,
        "label": current.label(),
        "state": current.state,
        "promotable": promotable,
        "blockers": blockers.iter().map(|b| b.description()).collect::<Vec<_>>(),
    }))
}
