//! Categorization rule CLI commands

use clap::Subcommand;

use super::{matches_id, CliContext};
use crate::error::{EngineError, EngineResult};
use crate::models::RuleId;

/// Rule subcommands
#[derive(Subcommand)]
pub enum RuleCommands {
    /// Suggest an envelope when a description contains a keyword
    Add {
        /// Keyword to look for
        keyword: String,
        /// Envelope name or ID
        envelope: String,
    },
    /// List rules in matching order
    List,
    /// Enable a rule
    Enable {
        /// Rule ID
        id: String,
    },
    /// Disable a rule without removing it
    Disable {
        /// Rule ID
        id: String,
    },
    /// Remove a rule
    Remove {
        /// Rule ID
        id: String,
    },
    /// Show which envelope a description would be assigned to
    Suggest {
        /// Transaction description
        description: String,
    },
}

fn resolve_rule(ctx: &CliContext<'_>, identifier: &str) -> EngineResult<RuleId> {
    ctx.storage
        .read(|data| {
            data.rules
                .iter()
                .find(|r| matches_id(&r.id.to_string(), r.id.as_uuid(), identifier))
                .map(|r| r.id)
        })?
        .ok_or_else(|| EngineError::not_found("Rule", identifier))
}

/// Handle a rule command
pub fn handle_rule_command(ctx: &CliContext<'_>, cmd: RuleCommands) -> EngineResult<()> {
    let service = ctx.rules();

    match cmd {
        RuleCommands::Add { keyword, envelope } => {
            let envelope = ctx.require_envelope(&envelope)?;
            let rule = service.add(envelope.id, &keyword)?;
            println!("Added rule: '{}' -> {}", rule.keyword, envelope.name);
            println!("  ID: {}", rule.id);
        }

        RuleCommands::List => {
            let rules = service.list()?;
            if rules.is_empty() {
                println!("No rules defined.");
                return Ok(());
            }
            let envelopes = ctx.envelopes().list(true)?;
            for (position, rule) in rules.iter().enumerate() {
                let target = envelopes
                    .iter()
                    .find(|e| e.id == rule.envelope_id)
                    .map(|e| e.name.as_str())
                    .unwrap_or("?");
                println!(
                    "{:>3}. {}  '{}' -> {}{}",
                    position + 1,
                    rule.id,
                    rule.keyword,
                    target,
                    if rule.active { "" } else { " (disabled)" }
                );
            }
        }

        RuleCommands::Enable { id } => {
            let rule = service.set_active(resolve_rule(ctx, &id)?, true)?;
            println!("Enabled rule '{}'", rule.keyword);
        }

        RuleCommands::Disable { id } => {
            let rule = service.set_active(resolve_rule(ctx, &id)?, false)?;
            println!("Disabled rule '{}'", rule.keyword);
        }

        RuleCommands::Remove { id } => {
            let id = resolve_rule(ctx, &id)?;
            service.remove(id)?;
            println!("Removed rule {}", id);
        }

        RuleCommands::Suggest { description } => match service.suggest_for(&description)? {
            Some(envelope) => {
                let envelope = ctx.envelopes().get(envelope)?;
                println!("{}", envelope.name);
            }
            None => println!("No matching rule."),
        },
    }

    Ok(())
}
