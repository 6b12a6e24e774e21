//! Envelope display formatting

use super::{column_width, Style};
use crate::models::Envelope;
use crate::services::{EnvelopeSpending, EnvelopeStatus};

/// Current period of every envelope, one row each
pub fn format_envelope_overview(rows: &[(Envelope, EnvelopeStatus)], style: &Style<'_>) -> String {
    if rows.is_empty() {
        return "No envelopes found.\n".to_string();
    }

    let name_width = column_width("Envelope", rows.iter().map(|(e, _)| e.name.as_str()));
    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:<24}  {:>12}  {:>12}  {:>12}\n",
        "Envelope", "Period", "Allocated", "Consumed", "Remaining"
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:-<24}  {:->12}  {:->12}  {:->12}\n",
        "", "", "", "", ""
    ));

    for (envelope, status) in rows {
        let marker = if status.is_over_budget() { " !" } else { "" };
        output.push_str(&format!(
            "{:<name_width$}  {:<24}  {:>12}  {:>12}  {:>12}{}\n",
            envelope.name,
            format!("{} - {}", style.date(status.period.start), style.date(status.period.end)),
            style.money(status.allocated),
            style.money(status.consumed),
            style.money(status.remaining),
            marker,
        ));
    }
    output
}

/// Detailed status of one period
pub fn format_envelope_status(envelope: &Envelope, status: &EnvelopeStatus, style: &Style<'_>) -> String {
    let mut output = String::new();
    output.push_str(&format!("Envelope: {}\n", envelope.name));
    output.push_str(&format!(
        "  Period:       {} - {}\n",
        style.date(status.period.start),
        style.date(status.period.end)
    ));
    output.push_str(&format!("  Budgeted:     {}\n", style.money(envelope.budgeted_amount)));
    if !status.carried_over.is_zero() {
        output.push_str(&format!("  Carried over: {}\n", style.money(status.carried_over)));
    }
    output.push_str(&format!(
        "  Allocated:    {}{}\n",
        style.money(status.allocated),
        if status.explicitly_funded { " (funded)" } else { "" }
    ));
    output.push_str(&format!("  Consumed:     {}\n", style.money(status.consumed)));
    output.push_str(&format!("  Remaining:    {}\n", style.money(status.remaining)));
    if status.is_over_budget() {
        output.push_str("  Over budget\n");
    }
    output
}

/// One row per period
pub fn format_envelope_history(history: &[EnvelopeStatus], style: &Style<'_>) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<12}  {:>12}  {:>12}  {:>12}  {:>12}\n",
        "Start", "End", "Carried", "Allocated", "Consumed", "Remaining"
    ));
    output.push_str(&format!(
        "{:-<12}  {:-<12}  {:->12}  {:->12}  {:->12}  {:->12}\n",
        "", "", "", "", "", ""
    ));
    for status in history {
        output.push_str(&format!(
            "{:<12}  {:<12}  {:>12}  {:>12}  {:>12}  {:>12}\n",
            style.date(status.period.start),
            style.date(status.period.end),
            style.money(status.carried_over),
            style.money(status.allocated),
            style.money(status.consumed),
            style.money(status.remaining),
        ));
    }
    output
}

pub fn format_spending(rows: &[EnvelopeSpending], style: &Style<'_>) -> String {
    if rows.is_empty() {
        return "No envelope spending in this range.\n".to_string();
    }

    let name_width = column_width("Envelope", rows.iter().map(|r| r.name.as_str()));
    let mut output = String::new();
    output.push_str(&format!("{:<name_width$}  {:>12}  {:>7}\n", "Envelope", "Spent", "Entries"));
    output.push_str(&format!("{:-<name_width$}  {:->12}  {:->7}\n", "", "", ""));
    for row in rows {
        output.push_str(&format!(
            "{:<name_width$}  {:>12}  {:>7}\n",
            row.name,
            style.money(row.spent),
            row.entry_count
        ));
    }
    output
}
