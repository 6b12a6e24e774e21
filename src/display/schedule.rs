//! Bill, income and agenda display formatting

use super::{column_width, Style};
use crate::models::{Bill, Income, RecurringRule};
use crate::services::{AgendaItem, Reminder, ScheduleSource, ScheduledOccurrence};

fn schedule_summary(rule: &RecurringRule, style: &Style<'_>) -> String {
    let mut summary = format!("{} from {}", rule.kind, style.date(rule.start_date));
    if let Some(end) = rule.end_date {
        summary.push_str(&format!(" until {}", style.date(end)));
    }
    summary
}

/// Format bills as a table
pub fn format_bill_list(bills: &[Bill], style: &Style<'_>) -> String {
    if bills.is_empty() {
        return "No bills found.\n".to_string();
    }

    let name_width = column_width("Name", bills.iter().map(|b| b.name.as_str()));
    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:>12}  {:<36}  {}\n",
        "Name", "Amount", "Schedule", "Status"
    ));
    output.push_str(&format!("{:-<name_width$}  {:->12}  {:-<36}  {:-<8}\n", "", "", "", ""));

    for bill in bills {
        output.push_str(&format!(
            "{:<name_width$}  {:>12}  {:<36}  {}\n",
            bill.name,
            style.money(bill.rule.amount),
            schedule_summary(&bill.rule, style),
            if bill.rule.active { "active" } else { "paused" },
        ));
    }
    output
}

/// Format income sources as a table
pub fn format_income_list(incomes: &[Income], style: &Style<'_>) -> String {
    if incomes.is_empty() {
        return "No income sources found.\n".to_string();
    }

    let name_width = column_width("Name", incomes.iter().map(|i| i.name.as_str()));
    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:>12}  {:<36}  {}\n",
        "Name", "Amount", "Schedule", "Status"
    ));
    output.push_str(&format!("{:-<name_width$}  {:->12}  {:-<36}  {:-<8}\n", "", "", "", ""));

    for income in incomes {
        output.push_str(&format!(
            "{:<name_width$}  {:>12}  {:<36}  {}\n",
            income.name,
            style.money(income.rule.amount),
            schedule_summary(&income.rule, style),
            if income.rule.active { "active" } else { "paused" },
        ));
    }
    output
}

/// Format the occurrences of one bill or income
pub fn format_occurrences(occurrences: &[ScheduledOccurrence], style: &Style<'_>) -> String {
    if occurrences.is_empty() {
        return "No occurrences in this window.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!("{:<12}  {:>12}  {:<8}  {}\n", "Date", "Amount", "Status", "Recorded"));
    output.push_str(&format!("{:-<12}  {:->12}  {:-<8}  {:-<12}\n", "", "", "", ""));
    for o in occurrences {
        let amount = if o.overridden {
            format!("{}*", style.money(o.amount))
        } else {
            style.money(o.amount)
        };
        output.push_str(&format!(
            "{:<12}  {:>12}  {:<8}  {}\n",
            style.date(o.date),
            amount,
            o.status.to_string(),
            o.recorded_amount.map(|a| style.money(a)).unwrap_or_default(),
        ));
    }
    if occurrences.iter().any(|o| o.overridden) {
        output.push_str("* overridden amount\n");
    }
    output
}

/// Format the merged agenda
pub fn format_agenda(items: &[AgendaItem], style: &Style<'_>) -> String {
    if items.is_empty() {
        return "Nothing scheduled in this window.\n".to_string();
    }

    let name_width = column_width("Name", items.iter().map(|i| i.name.as_str()));
    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<6}  {:<name_width$}  {:>12}  {}\n",
        "Date", "Type", "Name", "Amount", "Status"
    ));
    output.push_str(&format!("{:-<12}  {:-<6}  {:-<name_width$}  {:->12}  {:-<8}\n", "", "", "", "", ""));

    for item in items {
        let (kind, status) = match item.source {
            ScheduleSource::Income(_) if item.occurrence.status.is_settled() => ("income", "received".to_string()),
            ScheduleSource::Income(_) => ("income", item.occurrence.status.to_string()),
            ScheduleSource::Bill(_) => ("bill", item.occurrence.status.to_string()),
        };
        output.push_str(&format!(
            "{:<12}  {:<6}  {:<name_width$}  {:>12}  {}\n",
            style.date(item.occurrence.date),
            kind,
            item.name,
            style.money(item.occurrence.amount),
            status,
        ));
    }
    output
}

pub fn format_reminders(reminders: &[Reminder], style: &Style<'_>) -> String {
    if reminders.is_empty() {
        return "No upcoming bills to remind about.\n".to_string();
    }

    let mut output = String::new();
    for r in reminders {
        let when = match r.days_until {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {} days", n),
        };
        output.push_str(&format!(
            "{} {} due {} ({})\n",
            r.name,
            style.money(r.amount),
            when,
            style.date(r.due_date),
        ));
    }
    output
}
