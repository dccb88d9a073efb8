//! Agent management commands.
//!
//! - `immosync agent add <provider> <personennummer>` - Register or update a contact person
//! - `immosync agent list [provider]` - List agents and their published listings
//!
//! Imported listings are assigned to the agent whose person number matches
//! the listing's contact person. Listings without a registered agent keep
//! an empty assignee.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::AgentCommands;
use crate::cli::commands::open_storage;
use crate::error::{Error, Result};
use crate::storage::{Agent, AgentDetails, SqliteStorage};

#[derive(Serialize)]
struct AgentListOutput {
    agents: Vec<Agent>,
    count: usize,
}

/// Execute agent commands.
///
/// # Errors
///
/// Returns an error if the database is missing, the provider is unknown,
/// or the operation fails.
pub fn execute(
    command: &AgentCommands,
    db_path: Option<&Path>,
    actor: &str,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;

    match command {
        AgentCommands::Add {
            provider,
            external_id,
            salutation,
            firstname,
            lastname,
            email,
            phone,
        } => {
            let details = AgentDetails {
                salutation: salutation.clone(),
                firstname: firstname.clone(),
                lastname: lastname.clone(),
                email: email.clone(),
                phone: phone.clone(),
            };
            execute_add(&mut storage, provider, external_id, &details, actor, json)
        }
        AgentCommands::List { provider } => execute_list(&storage, provider.as_deref(), json),
    }
}

fn execute_add(
    storage: &mut SqliteStorage,
    provider_key: &str,
    external_id: &str,
    details: &AgentDetails,
    actor: &str,
    json: bool,
) -> Result<()> {
    let provider = storage.get_provider(provider_key.trim())?;
    let id = storage.upsert_agent(provider.id, external_id, details, actor)?;

    let agent = storage
        .list_agents(Some(&provider.external_key))?
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| Error::Other(format!("agent {id} vanished after upsert")))?;

    if json {
        println!("{}", serde_json::to_string(&agent)?);
    } else {
        println!(
            "Agent {} ({}) registered for {}",
            agent.external_id.cyan(),
            display_name(&agent.details),
            agent.provider
        );
    }

    Ok(())
}

fn execute_list(storage: &SqliteStorage, provider_key: Option<&str>, json: bool) -> Result<()> {
    if let Some(key) = provider_key {
        storage.get_provider(key)?;
    }
    let agents = storage.list_agents(provider_key)?;

    if json {
        let output = AgentListOutput {
            count: agents.len(),
            agents,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if agents.is_empty() {
        println!("No agents found.");
        println!("\nRegister one with: immosync agent add <anbieternr> <personennummer>");
    } else {
        println!("Agents ({}):\n", agents.len());
        for agent in &agents {
            println!(
                "  {:<20} {:<12} {:<30} {:>6} listings",
                agent.provider,
                agent.external_id,
                display_name(&agent.details),
                agent.listings
            );
        }
    }

    Ok(())
}

fn display_name(details: &AgentDetails) -> String {
    let name = [details.firstname.as_str(), details.lastname.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() { "unnamed".to_string() } else { name }
}
