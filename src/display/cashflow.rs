//! Cash-flow projection display

use super::Style;
use crate::services::{CashFlowEventKind, CashFlowProjection};

/// Day-by-day projection; quiet days are skipped unless `all_days`
pub fn format_projection(projection: &CashFlowProjection, style: &Style<'_>, all_days: bool) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Cash flow {} - {}\n",
        style.date(projection.window.start),
        style.date(projection.window.end)
    ));
    output.push_str(&format!("Opening balance: {}\n\n", style.money(projection.opening_balance)));

    output.push_str(&format!("{:<12}  {:>12}  {:>14}  {}\n", "Date", "Change", "Balance", "Events"));
    output.push_str(&format!("{:-<12}  {:->12}  {:->14}  {:-<20}\n", "", "", "", ""));

    for day in &projection.days {
        if day.events.is_empty() && !all_days {
            continue;
        }
        let events: Vec<String> = day
            .events
            .iter()
            .map(|e| match e.kind {
                CashFlowEventKind::ExpectedIncome => format!("+{} (expected)", e.name),
                CashFlowEventKind::UpcomingBill => format!("{} (due)", e.name),
                CashFlowEventKind::Recorded => e.name.clone(),
            })
            .collect();
        let flag = if day.is_negative {
            " NEGATIVE"
        } else if day.is_warning {
            " low"
        } else {
            ""
        };
        output.push_str(&format!(
            "{:<12}  {:>12}  {:>14}  {}{}\n",
            style.date(day.date),
            style.money(day.net_change()),
            style.money(day.balance),
            events.join(", "),
            flag,
        ));
    }

    output.push('\n');
    output.push_str(&format!("Closing balance: {}\n", style.money(projection.closing_balance())));
    if let Some(lowest) = projection.lowest() {
        output.push_str(&format!(
            "Lowest balance:  {} on {}\n",
            style.money(lowest.balance),
            style.date(lowest.date)
        ));
    }
    let negative = projection.negative_days().count();
    if negative > 0 {
        output.push_str(&format!("Warning: balance is negative on {} day(s)\n", negative));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, Period};
    use crate::services::{CashFlowDay, CashFlowEvent};
    use chrono::NaiveDate;

    fn projection() -> CashFlowProjection {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let quiet = CashFlowDay {
            date: start,
            events: Vec::new(),
            balance: Money::from_units(50),
            is_negative: false,
            is_warning: true,
        };
        let rent = CashFlowDay {
            date: start.succ_opt().unwrap(),
            events: vec![CashFlowEvent {
                kind: CashFlowEventKind::UpcomingBill,
                name: "Rent".into(),
                amount: Money::from_units(-80),
            }],
            balance: Money::from_units(-30),
            is_negative: true,
            is_warning: false,
        };
        CashFlowProjection {
            window: Period::new(start, rent.date).unwrap(),
            opening_balance: Money::from_units(50),
            days: vec![quiet, rent],
        }
    }

    #[test]
    fn test_quiet_days_skipped() {
        let output = format_projection(&projection(), &Style::default(), false);
        assert!(!output.contains("2024-01-01  "));
        assert!(output.contains("Rent (due) NEGATIVE"));
        assert!(output.contains("Lowest balance:  -$30.00 on 2024-01-02"));
        assert!(output.contains("negative on 1 day(s)"));
    }

    #[test]
    fn test_all_days_flags_low_balance() {
        let output = format_projection(&projection(), &Style::default(), true);
        assert!(output.contains(" low"));
    }
}
