//! Import command implementation

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use cloak_core::db::Database;
use cloak_core::import::{import_transactions, parse_json_records};
use cloak_core::models::{AccountType, ImportSummary};

pub fn cmd_import(
    db: &Database,
    file: &Path,
    account: &str,
    account_type: Option<&str>,
) -> Result<ImportSummary> {
    let account_type = account_type
        .map(|t| t.parse::<AccountType>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
    );
    let records = parse_json_records(reader)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    println!(
        "📥 Importing {} records into '{}' from {}...",
        records.len(),
        account,
        file.display()
    );

    let summary = import_transactions(db, account, account_type, &records)?;

    println!("✅ Import complete!");
    println!("   Imported: {}", summary.imported);
    println!("   Skipped (duplicates): {}", summary.skipped);
    if !summary.errors.is_empty() {
        println!("   ⚠️  Errors: {}", summary.errors.len());
        for error in &summary.errors {
            println!("      {}", error);
        }
    }

    Ok(summary)
}
