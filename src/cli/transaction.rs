//! Ledger entry CLI commands

use clap::Subcommand;

use super::{matches_id, parse_money, CliContext};
use crate::display::format_entry_list;
use crate::error::{EngineError, EngineResult};
use crate::models::{Transaction, TransactionId, TransactionKind};
use crate::services::LedgerService;

/// Transaction subcommands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a ledger entry
    Add {
        /// Account name or ID (source for expenses and transfers)
        account: String,
        /// Amount, always positive (e.g., "42.50")
        amount: String,
        /// Entry kind (income, expense, transfer)
        #[arg(short, long, default_value = "expense")]
        kind: String,
        /// Destination account for transfers
        #[arg(long)]
        to: Option<String>,
        /// Entry date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Description
        #[arg(short = 'm', long, default_value = "")]
        description: String,
        /// Envelope name or ID for expenses
        #[arg(short, long)]
        envelope: Option<String>,
        /// Do not suggest an envelope from categorization rules
        #[arg(long)]
        no_suggest: bool,
    },
    /// List entries for an account
    List {
        /// Account name or ID
        account: String,
    },
    /// Assign an existing expense to an envelope
    Categorize {
        /// Transaction ID
        id: String,
        /// Envelope name or ID
        envelope: String,
    },
    /// Delete an entry
    Delete {
        /// Transaction ID
        id: String,
    },
}

fn resolve_transaction(ctx: &CliContext<'_>, identifier: &str) -> EngineResult<TransactionId> {
    ctx.storage
        .read(|data| {
            data.transactions
                .iter()
                .find(|t| matches_id(&t.id.to_string(), t.id.as_uuid(), identifier))
                .map(|t| t.id)
        })?
        .ok_or_else(|| EngineError::not_found("Transaction", identifier))
}

/// Handle a transaction command
pub fn handle_transaction_command(ctx: &CliContext<'_>, cmd: TransactionCommands) -> EngineResult<()> {
    let ledger = LedgerService::new(ctx.storage);
    let style = ctx.style();

    match cmd {
        TransactionCommands::Add {
            account,
            amount,
            kind,
            to,
            date,
            description,
            envelope,
            no_suggest,
        } => {
            let kind = TransactionKind::parse(&kind).ok_or_else(|| {
                EngineError::Validation(format!(
                    "Invalid entry kind: '{}'. Valid kinds: income, expense, transfer",
                    kind
                ))
            })?;
            let source = ctx.require_account(&account)?;
            let amount = parse_money(&amount)?;
            let date = ctx.date_or_today(date.as_deref())?;

            let mut entry = match (kind, to) {
                (TransactionKind::Transfer, Some(to)) => {
                    let destination = ctx.require_account(&to)?;
                    Transaction::transfer(source.id, destination.id, amount, date)
                }
                (TransactionKind::Transfer, None) => {
                    return Err(EngineError::Validation(
                        "Transfers need a destination account (--to)".into(),
                    ));
                }
                (kind, _) => Transaction::new(source.id, kind, amount, date),
            }
            .with_description(description);

            if kind == TransactionKind::Expense {
                if let Some(envelope) = envelope {
                    entry = entry.with_envelope(ctx.require_envelope(&envelope)?.id);
                } else if !no_suggest {
                    if let Some(suggested) = ctx.rules().suggest_for(&entry.description)? {
                        let name = ctx.envelopes().get(suggested)?.name;
                        println!("Suggested envelope: {}", name);
                        entry = entry.with_envelope(suggested);
                    }
                }
            }

            let recorded = ledger.record(entry)?;
            println!(
                "Recorded {} of {} on {}",
                recorded.kind,
                style.money(recorded.amount),
                style.date(recorded.date)
            );
            println!("  ID: {}", recorded.id);
            println!("  Balance: {}", style.money(ledger.current_balance(source.id)?));
        }

        TransactionCommands::List { account } => {
            let found = ctx.require_account(&account)?;
            let entries = ledger.list_for_account(found.id, None)?;
            print!("{}", format_entry_list(found.id, &entries, &style));
        }

        TransactionCommands::Categorize { id, envelope } => {
            let id = resolve_transaction(ctx, &id)?;
            let envelope = ctx.require_envelope(&envelope)?;
            let entry = ledger.get(id)?.with_envelope(envelope.id);
            let updated = ledger.update(entry)?;
            println!("Assigned {} to envelope {}", updated.id, envelope.name);
        }

        TransactionCommands::Delete { id } => {
            let id = resolve_transaction(ctx, &id)?;
            let outcome = ledger.delete(id)?;
            println!("Deleted transaction {}", id);
            if outcome.removed.len() > 1 {
                println!("  Linked bill payment removed; the occurrence is unpaid again");
            }
        }
    }

    Ok(())
}
