//! Income CLI commands

use clap::Subcommand;

use super::{parse_date, parse_money, CliContext};
use crate::display::{format_income_list, format_occurrences};
use crate::error::EngineResult;
use crate::models::{RecurrenceKind, RecurringRule};

/// Income subcommands
#[derive(Subcommand)]
pub enum IncomeCommands {
    /// Add a recurring income source
    Add {
        /// Income name
        name: String,
        /// Amount per occurrence
        amount: String,
        /// Account the income lands in
        account: String,
        /// Recurrence (one_time, daily, weekly, biweekly, monthly, quarterly, yearly)
        #[arg(short, long, default_value = "monthly")]
        kind: String,
        /// First expected date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        start: Option<String>,
    },
    /// List income sources
    List {
        /// Include paused sources
        #[arg(short, long)]
        all: bool,
    },
    /// Show expected occurrences with received status
    Due {
        /// Income name or ID
        income: String,
        /// Window start (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,
        /// Window length in days
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Confirm one occurrence as received
    Receive {
        /// Income name or ID
        income: String,
        /// Scheduled date (YYYY-MM-DD)
        date: String,
        /// Receiving account, defaults to the income's account
        #[arg(short, long)]
        account: Option<String>,
        /// Amount actually received
        #[arg(long)]
        amount: Option<String>,
    },
    /// Undo a receipt and its ledger entry
    Unreceive {
        /// Income name or ID
        income: String,
        /// Scheduled date (YYYY-MM-DD)
        date: String,
    },
    /// Replace the amount of one occurrence
    Override {
        /// Income name or ID
        income: String,
        /// Scheduled date (YYYY-MM-DD)
        date: String,
        /// New amount
        amount: String,
    },
    /// Remove an amount override
    ClearOverride {
        /// Income name or ID
        income: String,
        /// Scheduled date (YYYY-MM-DD)
        date: String,
    },
    /// Stop expecting this income
    Pause {
        /// Income name or ID
        income: String,
    },
    /// Resume a paused income source
    Resume {
        /// Income name or ID
        income: String,
    },
    /// Delete an income source and its overrides
    Delete {
        /// Income name or ID
        income: String,
    },
}

/// Handle an income command
pub fn handle_income_command(ctx: &CliContext<'_>, cmd: IncomeCommands) -> EngineResult<()> {
    let service = ctx.incomes();
    let style = ctx.style();

    match cmd {
        IncomeCommands::Add {
            name,
            amount,
            account,
            kind,
            start,
        } => {
            let kind = RecurrenceKind::parse(&kind)?;
            let start = ctx.date_or_today(start.as_deref())?;
            let rule = RecurringRule::new(parse_money(&amount)?, kind, start);
            let account = ctx.require_account(&account)?;

            let income = service.create(&name, rule, account.id)?;
            println!("Created income: {}", income.name);
            println!("  Amount: {} {}", style.money(income.rule.amount), income.rule.kind);
            println!("  Into: {}", account.name);
            println!("  ID: {}", income.id);
        }

        IncomeCommands::List { all } => {
            let incomes = service.list(all)?;
            print!("{}", format_income_list(&incomes, &style));
        }

        IncomeCommands::Due { income, from, days } => {
            let income = ctx.require_income(&income)?;
            let window = ctx.window(from.as_deref(), days)?;
            let occurrences = service.occurrences(income.id, window, ctx.today)?;
            println!("{}", income.name);
            print!("{}", format_occurrences(&occurrences, &style));
        }

        IncomeCommands::Receive {
            income,
            date,
            account,
            amount,
        } => {
            let income = ctx.require_income(&income)?;
            let account = account.map(|a| ctx.require_account(&a)).transpose()?.map(|a| a.id);
            let amount = amount.as_deref().map(parse_money).transpose()?;
            let entry = service.record_income(income.id, parse_date(&date)?, account, amount)?;
            println!(
                "Received {} from {} on {}",
                style.money(entry.amount),
                income.name,
                style.date(entry.date)
            );
        }

        IncomeCommands::Unreceive { income, date } => {
            let income = ctx.require_income(&income)?;
            let entry = service.undo_receipt(income.id, parse_date(&date)?)?;
            println!(
                "Removed receipt of {} from {} on {}",
                style.money(entry.amount),
                income.name,
                style.date(entry.date)
            );
        }

        IncomeCommands::Override {
            income,
            date,
            amount,
        } => {
            let income = ctx.require_income(&income)?;
            let added = service.add_override(income.id, parse_date(&date)?, parse_money(&amount)?)?;
            println!(
                "{} on {} is now {}",
                income.name,
                style.date(added.date),
                style.money(added.amount)
            );
        }

        IncomeCommands::ClearOverride { income, date } => {
            let income = ctx.require_income(&income)?;
            let date = parse_date(&date)?;
            service.remove_override(income.id, date)?;
            println!("Cleared override for {} on {}", income.name, style.date(date));
        }

        IncomeCommands::Pause { income } => {
            let income = ctx.require_income(&income)?;
            service.set_active(income.id, false)?;
            println!("Paused income: {}", income.name);
        }

        IncomeCommands::Resume { income } => {
            let income = ctx.require_income(&income)?;
            service.set_active(income.id, true)?;
            println!("Resumed income: {}", income.name);
        }

        IncomeCommands::Delete { income } => {
            let income = ctx.require_income(&income)?;
            service.delete(income.id)?;
            println!("Deleted income: {}", income.name);
        }
    }

    Ok(())
}
