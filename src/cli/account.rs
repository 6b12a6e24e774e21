//! Account CLI commands

use clap::Subcommand;

use super::{parse_date, parse_money, CliContext};
use crate::display::{format_account_list, format_entry_list};
use crate::error::{EngineError, EngineResult};
use crate::models::{AccountKind, Period};
use crate::services::{AccountService, LedgerService};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account name
        name: String,
        /// Account type (checking, savings, credit, cash)
        #[arg(short = 't', long, default_value = "checking")]
        account_type: String,
        /// Starting balance (e.g., "1000.00" or "1000")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },
    /// List all accounts with balances
    List,
    /// Show an account's ledger entries
    Show {
        /// Account name or ID
        account: String,
        /// Only entries on or after this date
        #[arg(long)]
        from: Option<String>,
        /// Only entries on or before this date
        #[arg(long)]
        to: Option<String>,
    },
    /// Rename an account
    Rename {
        /// Account name or ID
        account: String,
        /// New name
        name: String,
    },
    /// Change the starting balance
    SetBalance {
        /// Account name or ID
        account: String,
        /// New starting balance
        #[arg(allow_hyphen_values = true)]
        balance: String,
    },
    /// Delete an account and its ledger entries
    Delete {
        /// Account name or ID
        account: String,
    },
}

/// Handle an account command
pub fn handle_account_command(ctx: &CliContext<'_>, cmd: AccountCommands) -> EngineResult<()> {
    let service = AccountService::new(ctx.storage);
    let style = ctx.style();

    match cmd {
        AccountCommands::Create {
            name,
            account_type,
            balance,
        } => {
            let kind = AccountKind::parse(&account_type).ok_or_else(|| {
                EngineError::Validation(format!(
                    "Invalid account type: '{}'. Valid types: checking, savings, credit, cash",
                    account_type
                ))
            })?;
            let starting_balance = parse_money(&balance)?;

            let account = service.create(&name, kind, starting_balance)?;

            println!("Created account: {}", account.name);
            println!("  Type: {}", account.kind);
            println!("  Starting Balance: {}", style.money(account.starting_balance));
            println!("  ID: {}", account.id);
        }

        AccountCommands::List => {
            let summaries = service.list_with_balances()?;
            print!("{}", format_account_list(&summaries, &style));
        }

        AccountCommands::Show { account, from, to } => {
            let found = ctx.require_account(&account)?;
            let range = match (from, to) {
                (None, None) => None,
                (from, to) => {
                    let start = from
                        .as_deref()
                        .map(parse_date)
                        .transpose()?
                        .unwrap_or(chrono::NaiveDate::MIN);
                    let end = to.as_deref().map(parse_date).transpose()?.unwrap_or(ctx.today);
                    Some(Period::new(start, end)?)
                }
            };

            let ledger = LedgerService::new(ctx.storage);
            let entries = ledger.list_for_account(found.id, range)?;
            let balance = ledger.current_balance(found.id)?;

            println!("{} ({})", found.name, found.kind);
            println!("Balance: {}", style.money(balance));
            println!();
            print!("{}", format_entry_list(found.id, &entries, &style));
        }

        AccountCommands::Rename { account, name } => {
            let found = ctx.require_account(&account)?;
            let updated = service.rename(found.id, &name)?;
            println!("Renamed account: {} -> {}", found.name, updated.name);
        }

        AccountCommands::SetBalance { account, balance } => {
            let found = ctx.require_account(&account)?;
            let updated = service.set_starting_balance(found.id, parse_money(&balance)?)?;
            println!(
                "Starting balance of {} is now {} (current: {})",
                updated.name,
                style.money(updated.starting_balance),
                style.money(updated.current_balance)
            );
        }

        AccountCommands::Delete { account } => {
            let found = ctx.require_account(&account)?;
            let outcome = service.delete(found.id)?;
            println!(
                "Deleted account: {} ({} related records removed)",
                found.name,
                outcome.removed.len().saturating_sub(1)
            );
        }
    }

    Ok(())
}
