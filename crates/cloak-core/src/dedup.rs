//! Transaction fingerprinting for deduplication
//!
//! A fingerprint is the SHA-256 of `(date, amount, description, account)`
//! after normalization. The fingerprint is stored in the unique
//! `transactions.import_hash` column; see [`Database::is_duplicate`] for the
//! existence check done before insertion.
//!
//! [`Database::is_duplicate`]: crate::db::Database::is_duplicate

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// ASCII unit separator; never present in dates, decimals or bank descriptions
const FIELD_SEPARATOR: &str = "\u{1f}";

/// Canonical form of a description for hashing: trimmed and lowercased
pub fn normalize_description(description: &str) -> String {
    description.trim().to_lowercase()
}

/// Compute the 64-character lowercase hex fingerprint of a transaction
///
/// The amount is rendered in canonical form with trailing zeros dropped, so
/// `-50.00`, `-50.0` and `-50` hash alike. The date is ISO 8601.
pub fn transaction_hash(
    date: NaiveDate,
    amount: Decimal,
    raw_description: &str,
    account_id: &str,
) -> String {
    let fields = [
        date.format("%Y-%m-%d").to_string(),
        amount.normalize().to_string(),
        normalize_description(raw_description),
        account_id.to_string(),
    ];

    let mut hasher = Sha256::new();
    hasher.update(fields.join(FIELD_SEPARATOR).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn amt(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_hash_is_deterministic() {
        let h1 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON PURCHASE", "acct-123");
        let h2 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON PURCHASE", "acct-123");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_each_field_changes_hash() {
        let base = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON", "acct-123");

        assert_ne!(
            base,
            transaction_hash(d(2024, 1, 16), amt("-50.00"), "AMAZON", "acct-123")
        );
        assert_ne!(
            base,
            transaction_hash(d(2024, 1, 15), amt("-51.00"), "AMAZON", "acct-123")
        );
        assert_ne!(
            base,
            transaction_hash(d(2024, 1, 15), amt("50.00"), "AMAZON", "acct-123")
        );
        assert_ne!(
            base,
            transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON 2", "acct-123")
        );
        assert_ne!(
            base,
            transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON", "acct-456")
        );
    }

    #[test]
    fn test_description_case_and_whitespace_insensitive() {
        let h1 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON", "acct-123");
        let h2 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "  amazon  ", "acct-123");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_amount_scale_does_not_change_hash() {
        let h1 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON", "acct-123");
        let h2 = transaction_hash(d(2024, 1, 15), amt("-50"), "AMAZON", "acct-123");
        let h3 = transaction_hash(d(2024, 1, 15), amt("-50.0"), "AMAZON", "acct-123");
        assert_eq!(h1, h2);
        assert_eq!(h1, h3);

        let cents = transaction_hash(d(2024, 1, 15), amt("-50.05"), "AMAZON", "acct-123");
        assert_ne!(h1, cents);
    }

    #[test]
    fn test_account_is_not_normalized() {
        let h1 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON", "ACCT");
        let h2 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AMAZON", "acct");
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_fields_cannot_bleed_into_each_other() {
        let h1 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "AB", "C");
        let h2 = transaction_hash(d(2024, 1, 15), amt("-50.00"), "A", "BC");
        assert_ne!(h1, h2);
    }
}
