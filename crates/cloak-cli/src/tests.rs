//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;
use std::path::PathBuf;

use cloak_core::db::Database;
use cloak_core::models::{AiProvider, Frequency};
use cloak_core::Config;
use rust_decimal::Decimal;
use tempfile::NamedTempFile;

use crate::commands::{self, truncate};

fn json_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn statement() -> NamedTempFile {
    json_file(
        r#"[
            {"date": "2024-01-05", "amount": "-15.49", "raw_description": "NETFLIX.COM", "clean_merchant": "Netflix"},
            {"date": "2024-01-12", "amount": "-40.00", "raw_description": "VENMO PAYMENT JOHN SMITH"}
        ]"#,
    )
}

// ========== Core Command Tests ==========

#[test]
fn test_resolve_db_path() {
    let config = Config::default();
    assert_eq!(
        commands::resolve_db_path(None, &config),
        PathBuf::from("cloak.db")
    );
    assert_eq!(
        commands::resolve_db_path(Some(PathBuf::from("/tmp/x.db").as_path()), &config),
        PathBuf::from("/tmp/x.db")
    );
}

#[test]
fn test_cmd_init_and_status_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cloak.db");

    commands::cmd_init(&path, 2, true).unwrap();
    assert!(path.exists());
    commands::cmd_status(&path, 2, true).unwrap();
}

#[test]
fn test_cmd_status_missing_db() {
    let dir = tempfile::tempdir().unwrap();
    let result = commands::cmd_status(&dir.path().join("missing.db"), 2, true);
    assert!(result.is_ok());
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_twice() {
    let db = Database::in_memory().unwrap();
    let file = statement();

    let first = commands::cmd_import(&db, file.path(), "Checking", Some("checking")).unwrap();
    assert_eq!(first.imported, 2);

    let second = commands::cmd_import(&db, file.path(), "Checking", None).unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped, 2);

    let tx = &db.list_transactions(10, 0).unwrap()[1];
    assert_eq!(tx.amount, Decimal::new(-1549, 2));
}

#[test]
fn test_cmd_import_rejects_bad_account_type() {
    let db = Database::in_memory().unwrap();
    let file = statement();
    assert!(commands::cmd_import(&db, file.path(), "Checking", Some("brokerage")).is_err());
}

#[test]
fn test_cmd_import_rejects_malformed_file() {
    let db = Database::in_memory().unwrap();
    let file = json_file("{\"rows\": 3}");
    assert!(commands::cmd_import(&db, file.path(), "Checking", None).is_err());
    assert_eq!(db.count_transactions().unwrap(), 0);
}

// ========== Token Command Tests ==========

#[test]
fn test_cmd_anonymize_then_detokenize() {
    let db = Database::in_memory().unwrap();
    let file = json_file(
        r#"[{"merchant": "Whole Foods", "category_name": "Groceries", "date": "2024-01-15",
             "description": "ZELLE TO JOHN SMITH", "account_name": "Chase Checking"}]"#,
    );

    let records = commands::cmd_anonymize(&db, file.path(), AiProvider::OpenAI, true).unwrap();
    assert_eq!(records[0]["merchant"], "MERCHANT_0001 [Groceries]");
    assert_eq!(records[0]["description"], "ZELLE PERSON_001");
    assert_eq!(records[0]["account"], "ACCOUNT_001");

    let restored =
        commands::cmd_detokenize(&db, "MERCHANT_0001 and PERSON_001 via ACCOUNT_001").unwrap();
    assert_eq!(restored, "Whole Foods and JOHN SMITH via Chase Checking");
}

#[test]
fn test_cmd_anonymize_respects_disabled_provider() {
    let db = Database::in_memory().unwrap();
    let file = json_file(r#"[{"merchant": "Whole Foods"}]"#);

    let records = commands::cmd_anonymize(&db, file.path(), AiProvider::Ollama, true).unwrap();
    assert_eq!(records[0]["merchant"], "Whole Foods");
}

#[test]
fn test_cmd_tokens_list_and_stats() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_tokens_list(&db, None, 20, 0).is_ok());

    commands::cmd_preview(&db, "VENMO JANE DOE").unwrap();
    assert!(commands::cmd_tokens_list(&db, Some("person"), 20, 0).is_ok());
    assert!(commands::cmd_tokens_list(&db, Some("planet"), 20, 0).is_err());
    assert!(commands::cmd_tokens_stats(&db).is_ok());
}

#[test]
fn test_cmd_tokens_unknown() {
    let db = Database::in_memory().unwrap();
    commands::cmd_preview(&db, "Costco").unwrap();

    let unknown = commands::cmd_tokens_unknown(
        &db,
        &["COSTCO".to_string(), "Target".to_string()],
    )
    .unwrap();
    assert_eq!(unknown, vec!["Target".to_string()]);
}

#[test]
fn test_cmd_shift_round_trip() {
    let db = Database::in_memory().unwrap();
    let shifted = commands::cmd_shift(&db, "2024-01-15", false).unwrap();
    let restored = commands::cmd_shift(&db, &shifted.to_string(), true).unwrap();
    assert_eq!(restored.to_string(), "2024-01-15");

    assert!(commands::cmd_shift(&db, "01/15/2024", false).is_err());
}

// ========== Privacy Command Tests ==========

#[test]
fn test_cmd_privacy_set() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_privacy_show(&db).is_ok());

    let settings = commands::cmd_privacy_set(&db, None, Some("ollama"), Some(true)).unwrap();
    assert!(settings.ollama_obfuscation);

    let settings = commands::cmd_privacy_set(&db, Some(false), None, None).unwrap();
    assert!(!settings.obfuscation_enabled);
    assert!(settings.ollama_obfuscation);
}

#[test]
fn test_cmd_privacy_set_validation() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_privacy_set(&db, None, None, None).is_err());
    assert!(commands::cmd_privacy_set(&db, None, Some("gemini"), Some(true)).is_err());
    assert!(commands::cmd_privacy_set(&db, None, Some("openai"), None).is_err());
}

// ========== Recurring Command Tests ==========

#[test]
fn test_cmd_recurring_next() {
    assert_eq!(
        commands::cmd_recurring_next("2024-01-31", "monthly")
            .unwrap()
            .to_string(),
        "2024-02-28"
    );
    assert_eq!(
        commands::cmd_recurring_next("2024-01-01", "whenever")
            .unwrap()
            .to_string(),
        "2024-01-31"
    );
    assert!(commands::cmd_recurring_next("yesterday", "weekly").is_err());
}

#[test]
fn test_cmd_recurring_mark_and_unmark() {
    let db = Database::in_memory().unwrap();
    let file = statement();
    commands::cmd_import(&db, file.path(), "Checking", None).unwrap();
    let netflix = db
        .list_transactions(10, 0)
        .unwrap()
        .into_iter()
        .find(|tx| tx.raw_description == "NETFLIX.COM")
        .unwrap();

    let group =
        commands::cmd_recurring_mark(&db, netflix.id, None, None, Some("yearly")).unwrap();
    assert_eq!(group.name, "Netflix");
    assert_eq!(group.frequency, Some(Frequency::Yearly));
    assert_eq!(group.next_expected_date.unwrap().to_string(), "2025-01-05");

    assert!(commands::cmd_recurring_list(&db, true).is_ok());

    commands::cmd_recurring_unmark(&db, netflix.id).unwrap();
    assert!(!db.get_transaction(netflix.id).unwrap().unwrap().is_recurring);

    assert!(commands::cmd_recurring_mark(&db, netflix.id, None, None, Some("hourly")).is_err());
    assert!(commands::cmd_recurring_mark(&db, netflix.id, Some(999), None, None).is_err());
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer merchant name", 10), "a much ...");
    assert_eq!(truncate("Café Olé Bistro", 8), "Café ...");
}
