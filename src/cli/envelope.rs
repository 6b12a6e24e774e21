//! Envelope CLI commands

use chrono::Duration;
use clap::Subcommand;

use super::{matches_id, parse_date, parse_money, CliContext};
use crate::display::{
    format_envelope_history, format_envelope_overview, format_envelope_status, format_spending,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{Envelope, EnvelopeTransferId, Period, RecurrenceKind};

/// Envelope subcommands
#[derive(Subcommand)]
pub enum EnvelopeCommands {
    /// Create an envelope
    Create {
        /// Envelope name
        name: String,
        /// Budgeted amount per period
        amount: String,
        /// Period length (daily, weekly, biweekly, monthly, quarterly, yearly)
        #[arg(short, long, default_value = "monthly")]
        kind: String,
        /// Date the first period starts (YYYY-MM-DD), defaults to today
        #[arg(long)]
        anchor: Option<String>,
        /// Account the envelope draws from
        #[arg(short, long)]
        account: Option<String>,
        /// Carry unspent money into the next period
        #[arg(long)]
        carry_over: bool,
    },
    /// Current period of every envelope
    List {
        /// Date to report on, defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Detailed status of one period
    Status {
        /// Envelope name or ID
        envelope: String,
        /// Any date inside the period, defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Status of every period in a range
    History {
        /// Envelope name or ID
        envelope: String,
        /// Range start (YYYY-MM-DD)
        from: String,
        /// Range end (YYYY-MM-DD), defaults to today
        to: Option<String>,
    },
    /// Fund a period with an explicit amount
    Allocate {
        /// Envelope name or ID
        envelope: String,
        /// Amount for the period
        amount: String,
        /// Any date inside the period, defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Income source that funded it
        #[arg(short, long)]
        income: Option<String>,
    },
    /// Remove an explicit allocation
    Unallocate {
        /// Envelope name or ID
        envelope: String,
        /// Any date inside the period, defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Move budget between envelopes
    Transfer {
        /// Source envelope
        from: String,
        /// Destination envelope
        to: String,
        /// Amount to move
        amount: String,
        /// Transfer date, defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Note
        #[arg(short = 'm', long)]
        note: Option<String>,
    },
    /// Remove an envelope transfer
    Untransfer {
        /// Transfer ID
        id: String,
    },
    /// Spending per envelope over a window
    Spending {
        /// Window start (YYYY-MM-DD), defaults to 30 days ago
        #[arg(long)]
        from: Option<String>,
        /// Window length in days
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Delete an envelope with its allocations, transfers and rules
    Delete {
        /// Envelope name or ID
        envelope: String,
    },
}

fn resolve_transfer(ctx: &CliContext<'_>, identifier: &str) -> EngineResult<EnvelopeTransferId> {
    ctx.storage
        .read(|data| {
            data.envelope_transfers
                .iter()
                .find(|t| matches_id(&t.id.to_string(), t.id.as_uuid(), identifier))
                .map(|t| t.id)
        })?
        .ok_or_else(|| EngineError::not_found("EnvelopeTransfer", identifier))
}

/// Handle an envelope command
pub fn handle_envelope_command(ctx: &CliContext<'_>, cmd: EnvelopeCommands) -> EngineResult<()> {
    let service = ctx.envelopes();
    let style = ctx.style();

    match cmd {
        EnvelopeCommands::Create {
            name,
            amount,
            kind,
            anchor,
            account,
            carry_over,
        } => {
            let kind = RecurrenceKind::parse(&kind)?;
            let mut envelope = Envelope::new(name.trim(), parse_money(&amount)?, kind)
                .anchored_at(ctx.date_or_today(anchor.as_deref())?)
                .with_carry_over(carry_over);
            envelope.account_id = account.map(|a| ctx.require_account(&a)).transpose()?.map(|a| a.id);

            let created = service.create(envelope)?;
            println!("Created envelope: {}", created.name);
            println!("  Budget: {} {}", style.money(created.budgeted_amount), created.period_kind);
            println!("  Carry over: {}", if created.carry_over { "Yes" } else { "No" });
            println!("  ID: {}", created.id);
        }

        EnvelopeCommands::List { date } => {
            let date = ctx.date_or_today(date.as_deref())?;
            let rows = service.overview(date)?;
            print!("{}", format_envelope_overview(&rows, &style));
        }

        EnvelopeCommands::Status { envelope, date } => {
            let envelope = ctx.require_envelope(&envelope)?;
            let date = ctx.date_or_today(date.as_deref())?;
            let status = service.status_for_period(envelope.id, date)?;
            print!("{}", format_envelope_status(&envelope, &status, &style));
        }

        EnvelopeCommands::History { envelope, from, to } => {
            let envelope = ctx.require_envelope(&envelope)?;
            let range = Period::new(parse_date(&from)?, ctx.date_or_today(to.as_deref())?)?;
            let history = service.history(envelope.id, range)?;
            println!("{}", envelope.name);
            print!("{}", format_envelope_history(&history, &style));
        }

        EnvelopeCommands::Allocate {
            envelope,
            amount,
            date,
            income,
        } => {
            let envelope = ctx.require_envelope(&envelope)?;
            let income = income.map(|i| ctx.require_income(&i)).transpose()?.map(|i| i.id);
            let date = ctx.date_or_today(date.as_deref())?;
            let allocation = service.allocate(envelope.id, date, parse_money(&amount)?, income)?;
            println!(
                "Allocated {} to {} for {}",
                style.money(allocation.amount),
                envelope.name,
                allocation.period
            );
        }

        EnvelopeCommands::Unallocate { envelope, date } => {
            let envelope = ctx.require_envelope(&envelope)?;
            let date = ctx.date_or_today(date.as_deref())?;
            let removed = service.remove_allocation(envelope.id, date)?;
            println!("Removed allocation for {} in {}", envelope.name, removed.period);
        }

        EnvelopeCommands::Transfer {
            from,
            to,
            amount,
            date,
            note,
        } => {
            let source = ctx.require_envelope(&from)?;
            let destination = ctx.require_envelope(&to)?;
            let date = ctx.date_or_today(date.as_deref())?;
            let transfer = service.transfer(source.id, destination.id, parse_money(&amount)?, date, note)?;
            println!(
                "Moved {} from {} to {}",
                style.money(transfer.amount),
                source.name,
                destination.name
            );
            println!("  ID: {}", transfer.id);

            let status = service.status_for_period(source.id, date)?;
            if status.is_over_budget() {
                println!("  Warning: {} is over budget by {}", source.name, style.money(-status.remaining));
            }
        }

        EnvelopeCommands::Untransfer { id } => {
            let id = resolve_transfer(ctx, &id)?;
            service.remove_transfer(id)?;
            println!("Removed envelope transfer {}", id);
        }

        EnvelopeCommands::Spending { from, days } => {
            let window = match from {
                Some(from) => ctx.window(Some(&from), days)?,
                None => {
                    let start = ctx.today - Duration::days(i64::from(days.max(1)) - 1);
                    Period::new(start, ctx.today)?
                }
            };
            let rows = service.spending_by_envelope(window)?;
            println!("Spending {}", window);
            print!("{}", format_spending(&rows, &style));
        }

        EnvelopeCommands::Delete { envelope } => {
            let envelope = ctx.require_envelope(&envelope)?;
            service.delete(envelope.id)?;
            println!("Deleted envelope: {}", envelope.name);
        }
    }

    Ok(())
}
