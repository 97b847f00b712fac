//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_db_path` - Pick the database path from flags and config
//! - `cmd_init` - Initialize the database
//! - `cmd_status` - Show database status

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cloak_core::db::{Database, DB_KEY_ENV};
use cloak_core::{Config, Tokenizer};

/// `--db` wins over the config file (which already includes CLOAK_DB_PATH)
pub fn resolve_db_path(cli_db: Option<&Path>, config: &Config) -> PathBuf {
    cli_db
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.database.path))
}

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, pool_size: u32, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_with_key(path_str, None, pool_size)
            .context("Failed to open database (unencrypted)")
    } else {
        let key = std::env::var(DB_KEY_ENV).with_context(|| {
            format!(
                "Database encryption required. Set {} or use --no-encrypt",
                DB_KEY_ENV
            )
        })?;
        Database::new_with_key(path_str, Some(&key), pool_size).context("Failed to open database")
    }
}

pub fn cmd_init(db_path: &Path, pool_size: u32, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, pool_size, no_encrypt)?;

    // Creates the default settings row
    let settings = db
        .get_privacy_settings()
        .context("Failed to create privacy settings")?;
    println!(
        "   Obfuscation: {}",
        if settings.obfuscation_enabled { "on" } else { "off" }
    );

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: cloak import --file tx.json --account \"Checking\"");
    println!("  2. Prepare them for AI: cloak anonymize --file tx.json");

    Ok(())
}

pub fn cmd_status(db_path: &Path, pool_size: u32, no_encrypt: bool) -> Result<()> {
    println!();
    println!("📊 Cloak Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, pool_size, no_encrypt) {
            Ok(db) => print_db_summary(&db)?,
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}

/// Counts shown by `status`
pub fn print_db_summary(db: &Database) -> Result<()> {
    let accounts = db.list_accounts()?;
    let transactions = db.count_transactions()?;
    let stats = Tokenizer::new(db.clone())?.get_token_stats()?;
    let groups = db.list_recurring_groups(false)?;

    println!();
    println!("   Accounts: {}", accounts.len());
    println!("   Transactions: {}", transactions);
    println!("   Recurring groups: {}", groups.len());
    println!(
        "   Tokens: {} merchants, {} accounts, {} people",
        stats.merchants, stats.accounts, stats.people
    );
    if stats.date_shift_days == 0 {
        println!("   Date shift: (not generated yet)");
    } else {
        println!("   Date shift: generated");
    }
    Ok(())
}
