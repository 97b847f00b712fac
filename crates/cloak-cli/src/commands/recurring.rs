//! Recurring group command implementations

use anyhow::Result;
use chrono::NaiveDate;
use cloak_core::db::Database;
use cloak_core::models::{Frequency, RecurringGroup, RecurringTarget};
use cloak_core::next_expected;

use super::{parse_date_arg, truncate};

fn date_or_unknown(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| "?".to_string())
}

pub fn cmd_recurring_list(db: &Database, include_inactive: bool) -> Result<()> {
    let groups = db.list_recurring_groups(include_inactive)?;

    if groups.is_empty() {
        println!("No recurring groups yet. Mark a transaction with:");
        println!("  cloak recurring mark <transaction-id> --new");
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Groups");
    println!("   ─────────────────────────────────────────────────────────────");

    for group in groups {
        let status_icon = if group.is_active { "✅" } else { "💤" };
        let amount_str = group
            .expected_amount
            .map(|a| format!("${:.2}", a))
            .unwrap_or_else(|| "?".to_string());
        let freq_str = group.frequency.map(|f| f.as_str()).unwrap_or("?");
        let count = db.group_transaction_count(group.id)?;

        println!(
            "   {} #{:<4} {:20} │ {:>8}/{:<9} │ {} charges │ last {} │ next {}",
            status_icon,
            group.id,
            truncate(&group.name, 20),
            amount_str,
            freq_str,
            count,
            date_or_unknown(group.last_seen_date),
            date_or_unknown(group.next_expected_date),
        );
    }

    Ok(())
}

/// Project the next charge date; unknown frequencies use the 30-day fallback
pub fn cmd_recurring_next(date: &str, frequency: &str) -> Result<NaiveDate> {
    let last = parse_date_arg(date)?;
    let frequency = frequency.parse::<Frequency>().ok();
    let next = next_expected(last, frequency);
    println!("{}", next);
    Ok(next)
}

pub fn cmd_recurring_mark(
    db: &Database,
    transaction_id: i64,
    group: Option<i64>,
    name: Option<String>,
    frequency: Option<&str>,
) -> Result<RecurringGroup> {
    let target = match group {
        Some(id) => RecurringTarget::Existing(id),
        None => RecurringTarget::New {
            name,
            frequency: frequency
                .map(|f| f.parse::<Frequency>())
                .transpose()
                .map_err(anyhow::Error::msg)?,
        },
    };

    let group = db.mark_transaction_recurring(transaction_id, target)?;
    println!(
        "✅ Transaction {} added to '{}' (#{})",
        transaction_id, group.name, group.id
    );
    println!(
        "   Next expected: {}",
        date_or_unknown(group.next_expected_date)
    );

    Ok(group)
}

pub fn cmd_recurring_unmark(db: &Database, transaction_id: i64) -> Result<()> {
    db.unmark_transaction_recurring(transaction_id)?;
    println!("✅ Transaction {} is no longer recurring", transaction_id);
    Ok(())
}
