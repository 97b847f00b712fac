//! Next-occurrence projection for recurring charges
//!
//! Month-based frequencies keep the day of month. When the target month is
//! too short for that day the result is clamped to the 28th, not to the last
//! day of the month; Feb 29 rolls to Feb 28 in non-leap years. Stored
//! `next_expected_date` values depend on this exact policy.

use chrono::{Datelike, Days, NaiveDate};

use crate::models::Frequency;

/// Days added when the frequency is unknown
pub const FALLBACK_INTERVAL_DAYS: u64 = 30;

/// Project the next expected charge date after `last_date`
///
/// `None` covers unknown or missing frequencies. Dates beyond chrono's range
/// saturate at [`NaiveDate::MAX`].
pub fn next_expected(last_date: NaiveDate, frequency: Option<Frequency>) -> NaiveDate {
    match frequency {
        Some(Frequency::Weekly) => add_days(last_date, 7),
        Some(Frequency::Biweekly) => add_days(last_date, 14),
        Some(Frequency::Monthly) => add_months_clamped(last_date, 1),
        Some(Frequency::Quarterly) => add_months_clamped(last_date, 3),
        Some(Frequency::Yearly) => add_months_clamped(last_date, 12),
        None => add_days(last_date, FALLBACK_INTERVAL_DAYS),
    }
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days))
        .unwrap_or(NaiveDate::MAX)
}

/// Same day of month `months` later, or the 28th if that day does not exist
fn add_months_clamped(date: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;

    NaiveDate::from_ymd_opt(year, month, date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 28))
        .unwrap_or(NaiveDate::MAX)
}
