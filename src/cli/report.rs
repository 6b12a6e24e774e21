//! Agenda, cash-flow and integrity reports

use super::CliContext;
use crate::display::{format_agenda, format_projection};
use crate::error::EngineResult;
use crate::services::{LedgerService, ScheduleService};

/// Merged bill and income agenda
pub fn handle_agenda_command(
    ctx: &CliContext<'_>,
    from: Option<String>,
    days: u32,
    outstanding: bool,
) -> EngineResult<()> {
    let window = ctx.window(from.as_deref(), days)?;
    let schedule = ScheduleService::new(ctx.storage);
    let items = if outstanding {
        schedule.outstanding(window, ctx.today)?
    } else {
        schedule.agenda(window, ctx.today)?
    };
    print!("{}", format_agenda(&items, &ctx.style()));
    Ok(())
}

/// Day-by-day projected balance
pub fn handle_flow_command(
    ctx: &CliContext<'_>,
    account: Option<String>,
    from: Option<String>,
    days: u32,
    all_days: bool,
) -> EngineResult<()> {
    let window = ctx.window(from.as_deref(), days)?;
    let account = account.map(|a| ctx.require_account(&a)).transpose()?;
    let projection = ctx.cashflow().project(window, ctx.today, account.map(|a| a.id))?;
    print!("{}", format_projection(&projection, &ctx.style(), all_days));
    Ok(())
}

/// Check every cached balance against the ledger
pub fn handle_verify_command(ctx: &CliContext<'_>) -> EngineResult<()> {
    let checked = LedgerService::new(ctx.storage).verify_all()?;
    println!("All {} account balances match the ledger.", checked);
    Ok(())
}
