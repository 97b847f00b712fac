//! Token command implementations (list, stats, unknown, anonymize, detokenize, preview, shift)

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use cloak_core::db::Database;
use cloak_core::models::{AiProvider, TokenType};
use cloak_core::Tokenizer;
use serde_json::{Map, Value};

use super::{parse_date_arg, truncate};

pub fn cmd_tokens_list(
    db: &Database,
    token_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<()> {
    let token_type = token_type
        .map(|t| t.parse::<TokenType>())
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let tokens = db.list_tokens(token_type, limit, offset)?;

    if tokens.is_empty() {
        println!("No tokens issued yet.");
        return Ok(());
    }

    println!();
    println!("🔑 Tokens");
    println!("   ─────────────────────────────────────────────────────────────");

    for token in tokens {
        let category = token
            .metadata
            .as_ref()
            .and_then(|m| m.get("category").or_else(|| m.get("account_type")))
            .map(String::as_str)
            .unwrap_or("");
        println!(
            "   {:14} │ {:30} │ {}",
            token.token,
            truncate(&token.original_value, 30),
            category
        );
    }

    Ok(())
}

pub fn cmd_tokens_stats(db: &Database) -> Result<()> {
    let tokenizer = Tokenizer::new(db.clone())?;
    let stats = tokenizer.get_token_stats()?;

    println!();
    println!("📊 Token Statistics");
    println!("   ─────────────────────────────");
    println!("   Merchants: {}", stats.merchants);
    println!("   Accounts:  {}", stats.accounts);
    println!("   People:    {}", stats.people);
    if stats.date_shift_days == 0 {
        println!("   Date shift: (not generated yet)");
    } else {
        println!("   Date shift: {} days", stats.date_shift_days);
    }

    Ok(())
}

pub fn cmd_tokens_unknown(db: &Database, names: &[String]) -> Result<Vec<String>> {
    let tokenizer = Tokenizer::new(db.clone())?;
    let unknown = tokenizer.get_unknown_merchants(names)?;

    if unknown.is_empty() {
        println!("✅ All {} merchants already have tokens", names.len());
    } else {
        println!("🆕 {} of {} merchants have no token:", unknown.len(), names.len());
        for name in &unknown {
            println!("   {}", name);
        }
    }

    Ok(unknown)
}

/// Tokenize records from a JSON file and print them
///
/// Status goes to stderr so stdout stays valid JSON.
pub fn cmd_anonymize(
    db: &Database,
    file: &Path,
    provider: AiProvider,
    include_category: bool,
) -> Result<Vec<Map<String, Value>>> {
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
    );
    let records: Vec<Map<String, Value>> = serde_json::from_reader(reader)
        .with_context(|| format!("Expected a JSON array of objects in {}", file.display()))?;

    let tokenizer = Tokenizer::new(db.clone())?;
    let settings = db.get_privacy_settings()?;

    if settings.should_obfuscate(provider) {
        eprintln!("🔒 Anonymizing {} records for {}", records.len(), provider);
    } else {
        eprintln!(
            "⚠️  Obfuscation is off for {}: records are passed through unchanged",
            provider
        );
    }

    let anonymized =
        tokenizer.anonymize_for_provider(&records, provider, &settings, include_category)?;
    println!("{}", serde_json::to_string_pretty(&anonymized)?);

    Ok(anonymized)
}

pub fn cmd_detokenize(db: &Database, text: &str) -> Result<String> {
    let tokenizer = Tokenizer::new(db.clone())?;
    let restored = tokenizer.detokenize(text);
    println!("{}", restored);
    Ok(restored)
}

pub fn cmd_preview(db: &Database, text: &str) -> Result<()> {
    let tokenizer = Tokenizer::new(db.clone())?;
    let preview = tokenizer.preview(text)?;

    println!();
    println!("👁️  Tokenization Preview");
    println!("   ─────────────────────────────");
    println!("   Original:    {}", preview.original);
    println!("   As merchant: {}", preview.tokenized);
    println!("   As description: {}", preview.description);

    Ok(())
}

/// Shift a date forward, or back when `reverse` is set
pub fn cmd_shift(db: &Database, date: &str, reverse: bool) -> Result<chrono::NaiveDate> {
    let date = parse_date_arg(date)?;
    let tokenizer = Tokenizer::new(db.clone())?;

    let result = if reverse {
        tokenizer.unshift_date(date)?
    } else {
        tokenizer.shift_date(date)?
    };
    println!("{}", result.format("%Y-%m-%d"));

    Ok(result)
}
