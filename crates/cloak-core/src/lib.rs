//! Cloak Core Library
//!
//! Privacy layer for personal finance data sent to AI providers:
//! - Database access and migrations
//! - Reversible tokenization of merchants, accounts and people
//! - Installation-wide date shifting
//! - Transaction fingerprints for duplicate-free imports
//! - Recurring charge groups and next-date projection
//! - Per-provider obfuscation settings

pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod import;
pub mod models;
pub mod recurrence;
pub mod tokenize;

pub use config::{AnonymizeConfig, Config, DatabaseConfig};
pub use db::{Database, TransactionInsertResult};
pub use dedup::transaction_hash;
pub use error::{Error, Result};
pub use import::{import_transactions, parse_json_records};
pub use recurrence::next_expected;
pub use tokenize::Tokenizer;
