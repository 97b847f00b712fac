//! Transaction import with fingerprint deduplication

use std::io::Read;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::{Database, TransactionInsertResult};
use crate::dedup::transaction_hash;
use crate::error::Result;
use crate::models::{AccountType, ImportSummary, NewTransaction, RawTransaction};

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    List(Vec<RawTransaction>),
    Wrapped { transactions: Vec<RawTransaction> },
}

/// Parse parsed-transaction records from JSON
///
/// Accepts either a bare array or an object with a `transactions` array.
pub fn parse_json_records<R: Read>(reader: R) -> Result<Vec<RawTransaction>> {
    let records = match serde_json::from_reader(reader)? {
        RecordFile::List(records) => records,
        RecordFile::Wrapped { transactions } => transactions,
    };
    debug!("Parsed {} transaction records", records.len());
    Ok(records)
}

/// Fingerprint a record for an account
pub fn fingerprint(record: &RawTransaction, account_id: i64) -> String {
    transaction_hash(
        record.date,
        record.amount,
        &record.raw_description,
        &account_id.to_string(),
    )
}

/// Import records into an account, skipping ones already stored
///
/// The account is created if it does not exist. A record whose insert fails
/// is reported in `errors` and does not stop the batch.
pub fn import_transactions(
    db: &Database,
    account_name: &str,
    account_type: Option<AccountType>,
    records: &[RawTransaction],
) -> Result<ImportSummary> {
    let account_id = db.upsert_account(account_name, account_type)?;
    let mut summary = ImportSummary::default();

    for (index, record) in records.iter().enumerate() {
        let import_hash = fingerprint(record, account_id);

        if db.is_duplicate(&import_hash)? {
            summary.skipped += 1;
            continue;
        }

        let tx = NewTransaction {
            date: record.date,
            amount: record.amount,
            raw_description: record.raw_description.clone(),
            clean_merchant: record.clean_merchant.clone(),
            category: record.category.clone(),
            import_hash,
        };

        match db.insert_transaction(account_id, &tx) {
            Ok(TransactionInsertResult::Inserted(_)) => summary.imported += 1,
            Ok(TransactionInsertResult::Duplicate(id)) => {
                debug!("Record {} matched transaction {} on insert", index, id);
                summary.skipped += 1;
            }
            Err(e) => {
                warn!("Failed to import record {}: {}", index, e);
                summary.errors.push(format!("record {}: {}", index, e));
            }
        }
    }

    info!(
        "Import into account {}: {} imported, {} skipped, {} errors",
        account_id,
        summary.imported,
        summary.skipped,
        summary.errors.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn record(date: &str, amount: &str, description: &str) -> RawTransaction {
        RawTransaction {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            amount: Decimal::from_str(amount).unwrap(),
            raw_description: description.to_string(),
            clean_merchant: None,
            category: None,
        }
    }

    #[test]
    fn test_import_twice_skips_duplicates() {
        let db = Database::in_memory().unwrap();
        let records = vec![
            record("2024-01-15", "-50.00", "AMAZON"),
            record("2024-01-16", "-12.50", "NETFLIX"),
        ];

        let first = import_transactions(&db, "Checking", None, &records).unwrap();
        assert_eq!(first.imported, 2);
        assert_eq!(first.skipped, 0);

        let second = import_transactions(&db, "Checking", None, &records).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 2);
        assert!(second.errors.is_empty());

        assert_eq!(db.count_transactions().unwrap(), 2);
    }

    #[test]
    fn test_description_case_does_not_defeat_dedup() {
        let db = Database::in_memory().unwrap();
        import_transactions(&db, "Checking", None, &[record("2024-01-15", "-50.00", "Amazon")])
            .unwrap();
        let summary = import_transactions(
            &db,
            "Checking",
            None,
            &[record("2024-01-15", "-50.00", "  AMAZON ")],
        )
        .unwrap();
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_same_record_in_two_accounts() {
        let db = Database::in_memory().unwrap();
        let records = vec![record("2024-01-15", "-50.00", "AMAZON")];

        import_transactions(&db, "Checking", None, &records).unwrap();
        let summary = import_transactions(&db, "Credit Card", None, &records).unwrap();

        assert_eq!(summary.imported, 1);
        assert_eq!(db.count_transactions().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_within_one_batch() {
        let db = Database::in_memory().unwrap();
        let records = vec![
            record("2024-01-15", "-50.00", "AMAZON"),
            record("2024-01-15", "-50.00", "amazon"),
        ];
        let summary = import_transactions(&db, "Checking", None, &records).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_string_and_number_amounts_dedup() {
        let db = Database::in_memory().unwrap();
        let as_string = parse_json_records(
            r#"[{"date": "2024-01-15", "amount": "-50.00", "raw_description": "AMAZON"}]"#
                .as_bytes(),
        )
        .unwrap();
        let as_number = parse_json_records(
            r#"[{"date": "2024-01-15", "amount": -50.00, "raw_description": "AMAZON"}]"#
                .as_bytes(),
        )
        .unwrap();

        let first = import_transactions(&db, "Checking", None, &as_string).unwrap();
        assert_eq!(first.imported, 1);

        let second = import_transactions(&db, "Checking", None, &as_number).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(db.count_transactions().unwrap(), 1);
    }

    #[test]
    fn test_parse_json_records() {
        let bare = r#"[{"date": "2024-01-15", "amount": -50.0, "raw_description": "AMAZON"}]"#;
        let records = parse_json_records(bare.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_description, "AMAZON");

        let wrapped = r#"{"transactions": [
            {"date": "2024-01-15", "amount": "-50.00", "description": "AMAZON", "clean_merchant": "Amazon"}
        ]}"#;
        let records = parse_json_records(wrapped.as_bytes()).unwrap();
        assert_eq!(records[0].clean_merchant.as_deref(), Some("Amazon"));

        assert!(parse_json_records("{\"nope\": 1}".as_bytes()).is_err());
    }
}
