//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, status) and shared utilities (open_db)
//! - `import` - Transaction import
//! - `tokens` - Token inspection, anonymize/detokenize, date shifting
//! - `privacy` - Obfuscation settings
//! - `recurring` - Recurring charge groups

pub mod core;
pub mod import;
pub mod privacy;
pub mod recurring;
pub mod tokens;

// Re-export command functions for main.rs
pub use core::*;
pub use import::*;
pub use privacy::*;
pub use recurring::*;
pub use tokens::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Parse a `YYYY-MM-DD` argument
pub fn parse_date_arg(s: &str) -> anyhow::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("Invalid date '{}' (expected YYYY-MM-DD): {}", s, e))
}
