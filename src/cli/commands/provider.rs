//! Provider management commands.
//!
//! - `immosync provider add <key>` - Register or update a provider
//! - `immosync provider list` - List providers and their published listings

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::ProviderCommands;
use crate::cli::commands::open_storage;
use crate::error::Result;
use crate::storage::{Provider, SqliteStorage};

#[derive(Serialize)]
struct ProviderListOutput {
    providers: Vec<Provider>,
    count: usize,
}

/// Execute provider commands.
///
/// # Errors
///
/// Returns an error if the database is missing or the operation fails.
pub fn execute(
    command: &ProviderCommands,
    db_path: Option<&Path>,
    actor: &str,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;

    match command {
        ProviderCommands::Add {
            key,
            name,
            disabled,
        } => execute_add(&mut storage, key, name.as_deref(), !disabled, actor, json),
        ProviderCommands::List => execute_list(&storage, json),
    }
}

fn execute_add(
    storage: &mut SqliteStorage,
    key: &str,
    name: Option<&str>,
    enabled: bool,
    actor: &str,
    json: bool,
) -> Result<()> {
    let name = name.unwrap_or(key);
    storage.upsert_provider(key, name, enabled, actor)?;
    let provider = storage.get_provider(key.trim())?;

    if json {
        println!("{}", serde_json::to_string(&provider)?);
    } else {
        let state = if provider.enabled { "enabled" } else { "disabled" };
        println!(
            "Provider {} ({}) {}",
            provider.external_key.cyan(),
            provider.name,
            state
        );
    }

    Ok(())
}

fn execute_list(storage: &SqliteStorage, json: bool) -> Result<()> {
    let providers = storage.list_providers()?;

    if json {
        let output = ProviderListOutput {
            count: providers.len(),
            providers,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if providers.is_empty() {
        println!("No providers found.");
        println!("\nRegister one with: immosync provider add <anbieternr>");
    } else {
        println!("Providers ({}):\n", providers.len());
        for provider in &providers {
            let state = if provider.enabled {
                "enabled".green()
            } else {
                "disabled".dimmed()
            };
            println!(
                "  {:<20} {:<30} {:>6} listings  {}",
                provider.external_key, provider.name, provider.listings, state
            );
        }
    }

    Ok(())
}
