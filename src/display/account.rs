//! Account and ledger display formatting

use super::{column_width, Style};
use crate::models::{AccountId, Money, Transaction};
use crate::services::AccountSummary;

/// Format a list of accounts with balances as a table
pub fn format_account_list(summaries: &[AccountSummary], style: &Style<'_>) -> String {
    if summaries.is_empty() {
        return "No accounts found.\n".to_string();
    }

    let name_width = column_width("Name", summaries.iter().map(|s| s.account.name.as_str()));
    let kinds: Vec<String> = summaries.iter().map(|s| s.account.kind.to_string()).collect();
    let kind_width = column_width("Type", kinds.iter().map(String::as_str));

    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:<kind_width$}  {:>14}  {:>7}\n",
        "Name", "Type", "Balance", "Entries",
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:-<kind_width$}  {:->14}  {:->7}\n",
        "", "", "", "",
    ));

    for (summary, kind) in summaries.iter().zip(&kinds) {
        output.push_str(&format!(
            "{:<name_width$}  {:<kind_width$}  {:>14}  {:>7}\n",
            summary.account.name,
            kind,
            style.money(summary.balance),
            summary.entry_count,
        ));
    }

    let total = Money::try_sum(summaries.iter().map(|s| s.balance))
        .map_or_else(|| "overflow".to_string(), |total| style.money(total));
    output.push_str(&format!(
        "{:<name_width$}  {:<kind_width$}  {:>14}\n",
        "TOTAL", "", total,
    ));

    output
}

/// Format ledger entries as seen from one account
pub fn format_entry_list(account: AccountId, entries: &[Transaction], style: &Style<'_>) -> String {
    if entries.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<12}  {:<8}  {:>12}  {}\n",
        "ID", "Date", "Kind", "Amount", "Description"
    ));
    output.push_str(&format!(
        "{:-<12}  {:-<12}  {:-<8}  {:->12}  {:-<20}\n",
        "", "", "", "", ""
    ));

    for entry in entries {
        output.push_str(&format!(
            "{:<12}  {:<12}  {:<8}  {:>12}  {}\n",
            entry.id.to_string(),
            style.date(entry.date),
            entry.kind.to_string(),
            style.money(entry.effect_on(account)),
            entry.description,
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountKind};
    use chrono::NaiveDate;

    #[test]
    fn test_account_table_has_total() {
        let account = Account::new("Checking", AccountKind::Checking, Money::from_units(10));
        let summaries = vec![AccountSummary {
            account,
            balance: Money::from_units(10),
            entry_count: 0,
        }];
        let output = format_account_list(&summaries, &Style::default());
        assert!(output.contains("Checking"));
        assert!(output.contains("TOTAL"));
        assert!(output.contains("$10.00"));
    }

    #[test]
    fn test_entries_signed_from_account_view() {
        let account = Account::new("Checking", AccountKind::Checking, Money::zero());
        let entry = Transaction::expense(
            account.id,
            Money::from_units(25),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
        .with_description("Groceries");
        let output = format_entry_list(account.id, &[entry], &Style::default());
        assert!(output.contains("-$25.00"));
        assert!(output.contains("Groceries"));
    }
}
