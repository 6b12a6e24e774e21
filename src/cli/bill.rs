//! Bill CLI commands

use clap::Subcommand;

use super::{parse_date, parse_money, CliContext};
use crate::display::{format_bill_list, format_occurrences, format_reminders};
use crate::error::EngineResult;
use crate::models::{RecurrenceKind, RecurringRule};
use crate::services::PaymentOptions;

/// Bill subcommands
#[derive(Subcommand)]
pub enum BillCommands {
    /// Add a recurring bill
    Add {
        /// Bill name
        name: String,
        /// Amount per occurrence
        amount: String,
        /// Recurrence (one_time, daily, weekly, biweekly, monthly, quarterly, yearly)
        #[arg(short, long, default_value = "monthly")]
        kind: String,
        /// First due date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        start: Option<String>,
        /// Last possible due date
        #[arg(short, long)]
        end: Option<String>,
        /// Account payments are drawn from
        #[arg(short, long)]
        account: Option<String>,
        /// Days before the due date to start reminding
        #[arg(long)]
        remind: Option<u32>,
    },
    /// List bills
    List {
        /// Include paused bills
        #[arg(short, long)]
        all: bool,
    },
    /// Show occurrences of a bill with paid/overdue status
    Due {
        /// Bill name or ID
        bill: String,
        /// Window start (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,
        /// Window length in days
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Record a payment for one occurrence
    Pay {
        /// Bill name or ID
        bill: String,
        /// Scheduled date being paid (YYYY-MM-DD)
        date: String,
        /// Paying account, defaults to the bill's account
        #[arg(short, long)]
        account: Option<String>,
        /// Amount actually paid, defaults to the scheduled amount
        #[arg(long)]
        amount: Option<String>,
        /// Envelope to charge
        #[arg(short, long)]
        envelope: Option<String>,
    },
    /// Undo a payment and its ledger entry
    Unpay {
        /// Bill name or ID
        bill: String,
        /// Scheduled date (YYYY-MM-DD)
        date: String,
    },
    /// Replace the amount of one occurrence
    Override {
        /// Bill name or ID
        bill: String,
        /// Scheduled date (YYYY-MM-DD)
        date: String,
        /// New amount
        amount: String,
    },
    /// Remove an amount override
    ClearOverride {
        /// Bill name or ID
        bill: String,
        /// Scheduled date (YYYY-MM-DD)
        date: String,
    },
    /// Stop generating occurrences
    Pause {
        /// Bill name or ID
        bill: String,
    },
    /// Resume a paused bill
    Resume {
        /// Bill name or ID
        bill: String,
    },
    /// Delete a bill with its overrides and payments
    Delete {
        /// Bill name or ID
        bill: String,
    },
    /// Unpaid bills coming due within their reminder lead time
    Reminders,
}

/// Handle a bill command
pub fn handle_bill_command(ctx: &CliContext<'_>, cmd: BillCommands) -> EngineResult<()> {
    let service = ctx.bills();
    let style = ctx.style();

    match cmd {
        BillCommands::Add {
            name,
            amount,
            kind,
            start,
            end,
            account,
            remind,
        } => {
            let kind = RecurrenceKind::parse(&kind)?;
            let start = ctx.date_or_today(start.as_deref())?;
            let mut rule = RecurringRule::new(parse_money(&amount)?, kind, start);
            if let Some(end) = end {
                rule = rule.with_end_date(parse_date(&end)?);
            }
            let account = account.map(|a| ctx.require_account(&a)).transpose()?;

            let mut bill = service.create(&name, rule, account.map(|a| a.id))?;
            if let Some(days) = remind {
                bill.reminder_days_before = days;
                bill = service.update(bill)?;
            }

            println!("Created bill: {}", bill.name);
            println!("  Amount: {} {}", style.money(bill.rule.amount), bill.rule.kind);
            println!("  Starts: {}", style.date(bill.rule.start_date));
            println!("  ID: {}", bill.id);
        }

        BillCommands::List { all } => {
            let bills = service.list(all)?;
            print!("{}", format_bill_list(&bills, &style));
        }

        BillCommands::Due { bill, from, days } => {
            let bill = ctx.require_bill(&bill)?;
            let window = ctx.window(from.as_deref(), days)?;
            let occurrences = service.due_occurrences(bill.id, window, ctx.today)?;
            println!("{}", bill.name);
            print!("{}", format_occurrences(&occurrences, &style));
        }

        BillCommands::Pay {
            bill,
            date,
            account,
            amount,
            envelope,
        } => {
            let bill = ctx.require_bill(&bill)?;
            let options = PaymentOptions {
                account: account.map(|a| ctx.require_account(&a)).transpose()?.map(|a| a.id),
                amount: amount.as_deref().map(parse_money).transpose()?,
                envelope: envelope.map(|e| ctx.require_envelope(&e)).transpose()?.map(|e| e.id),
            };
            let payment = service.record_payment(bill.id, parse_date(&date)?, options)?;
            println!(
                "Paid {} for {} due {}",
                style.money(payment.amount),
                bill.name,
                style.date(payment.payment_date)
            );
        }

        BillCommands::Unpay { bill, date } => {
            let bill = ctx.require_bill(&bill)?;
            let payment = service.undo_payment(bill.id, parse_date(&date)?)?;
            println!(
                "Removed payment of {} for {} due {}",
                style.money(payment.amount),
                bill.name,
                style.date(payment.payment_date)
            );
        }

        BillCommands::Override { bill, date, amount } => {
            let bill = ctx.require_bill(&bill)?;
            let added = service.add_override(bill.id, parse_date(&date)?, parse_money(&amount)?)?;
            println!(
                "{} on {} is now {}",
                bill.name,
                style.date(added.date),
                style.money(added.amount)
            );
        }

        BillCommands::ClearOverride { bill, date } => {
            let bill = ctx.require_bill(&bill)?;
            let date = parse_date(&date)?;
            service.remove_override(bill.id, date)?;
            println!("Cleared override for {} on {}", bill.name, style.date(date));
        }

        BillCommands::Pause { bill } => {
            let bill = ctx.require_bill(&bill)?;
            service.set_active(bill.id, false)?;
            println!("Paused bill: {}", bill.name);
        }

        BillCommands::Resume { bill } => {
            let bill = ctx.require_bill(&bill)?;
            service.set_active(bill.id, true)?;
            println!("Resumed bill: {}", bill.name);
        }

        BillCommands::Delete { bill } => {
            let bill = ctx.require_bill(&bill)?;
            service.delete(bill.id)?;
            println!("Deleted bill: {}", bill.name);
        }

        BillCommands::Reminders => {
            let reminders = service.reminders_due(ctx.today)?;
            print!("{}", format_reminders(&reminders, &style));
        }
    }

    Ok(())
}
