//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cloak - Keep personal finance data private when asking AI for help
#[derive(Parser)]
#[command(name = "cloak")]
#[command(about = "Reversible PII tokenization for finance records sent to AI", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides config and CLOAK_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to ~/.local/share/cloak/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CLOAK_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status (encryption, size, token counts)
    Status,

    /// Import parsed transactions from a JSON file
    Import {
        /// JSON file: an array of records or {"transactions": [...]}
        #[arg(short, long)]
        file: PathBuf,

        /// Account the records belong to
        #[arg(short, long)]
        account: String,

        /// Account type: checking, savings, credit
        #[arg(long)]
        account_type: Option<String>,
    },

    /// Inspect issued tokens
    Tokens {
        #[command(subcommand)]
        action: TokensAction,
    },

    /// Anonymize transaction records for an AI provider and print them as JSON
    Anonymize {
        /// JSON file with an array of transaction records
        #[arg(short, long)]
        file: PathBuf,

        /// Leave category labels off merchant tokens
        #[arg(long)]
        no_category: bool,

        /// Target provider (defaults to config): ollama, openrouter, anthropic, openai
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Replace tokens in text with their original values
    Detokenize {
        /// Text containing tokens such as MERCHANT_0001
        text: String,
    },

    /// Show how a merchant name or description would be tokenized
    Preview {
        /// Merchant name or transaction description
        text: String,
    },

    /// Shift a date (YYYY-MM-DD) by the installation offset
    Shift {
        date: String,
    },

    /// Undo the installation offset on a shifted date (YYYY-MM-DD)
    Unshift {
        date: String,
    },

    /// Show or change obfuscation settings
    Privacy {
        #[command(subcommand)]
        action: Option<PrivacyAction>,
    },

    /// Manage recurring charge groups
    Recurring {
        #[command(subcommand)]
        action: Option<RecurringAction>,
    },
}

#[derive(Subcommand)]
pub enum TokensAction {
    /// List issued tokens, newest first
    List {
        /// Token type: merchant, account, person
        #[arg(short = 't', long = "type")]
        token_type: Option<String>,

        /// Number of tokens to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Number of tokens to skip
        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// Show token counts and the date shift
    Stats,

    /// List merchant names that have no token yet
    Unknown {
        /// Merchant names to check
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PrivacyAction {
    /// Show current settings
    Show,

    /// Change settings
    Set {
        /// Master obfuscation switch
        #[arg(long)]
        enabled: Option<bool>,

        /// Provider to change: ollama, openrouter, anthropic, openai
        #[arg(long, requires = "obfuscate")]
        provider: Option<String>,

        /// Obfuscation for --provider
        #[arg(long, requires = "provider")]
        obfuscate: Option<bool>,
    },
}

#[derive(Subcommand)]
pub enum RecurringAction {
    /// List recurring groups
    List {
        /// Include inactive groups
        #[arg(long)]
        all: bool,
    },

    /// Project the next expected charge date
    Next {
        /// Date of the last charge (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// weekly, biweekly, monthly, quarterly, yearly (others fall back to 30 days)
        #[arg(short, long)]
        frequency: String,
    },

    /// Mark a transaction as recurring
    Mark {
        /// Transaction ID
        transaction_id: i64,

        /// Existing group to add the transaction to
        #[arg(long, conflicts_with_all = ["new", "name", "frequency"])]
        group: Option<i64>,

        /// Create a new group from the transaction
        #[arg(long, required_unless_present = "group")]
        new: bool,

        /// Name for the new group (defaults to the merchant)
        #[arg(long)]
        name: Option<String>,

        /// Frequency for the new group (defaults to monthly)
        #[arg(long)]
        frequency: Option<String>,
    },

    /// Remove a transaction from its recurring group
    Unmark {
        /// Transaction ID
        transaction_id: i64,
    },
}
