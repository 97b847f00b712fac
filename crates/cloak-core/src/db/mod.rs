//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `tokens` - Token store and the installation date shift
//! - `transactions` - Accounts, transaction inserts and duplicate checks
//! - `recurring` - Recurring charge groups
//! - `privacy` - Obfuscation settings
//!
//! The database is the single writer for every table it owns. The token
//! cache in [`crate::tokenize::Tokenizer`] relies on that: rows written by
//! another process are invisible until `Tokenizer::refresh` is called.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod privacy;
mod recurring;
mod tokens;
mod transactions;

pub use transactions::TransactionInsertResult;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "CLOAK_DB_KEY";

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"cloak-salt-v1-fx";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored `YYYY-MM-DD` date column
pub(crate) fn parse_date(s: &str) -> rusqlite::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a stored decimal text column
pub(crate) fn parse_decimal(s: &str) -> rusqlite::Result<rust_decimal::Decimal> {
    s.parse::<rust_decimal::Decimal>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// True when an insert failed on a UNIQUE or PRIMARY KEY constraint
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new encrypted database connection pool
    ///
    /// Requires `CLOAK_DB_KEY` to be set. Returns an error otherwise; use
    /// `new_unencrypted()` for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key), DEFAULT_POOL_SIZE),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended: the token map \
                stores original merchant, account and person names).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: original values behind every token are stored in clear.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None, DEFAULT_POOL_SIZE)
    }

    /// Create a new database with an explicit encryption key and pool size
    pub fn new_with_key(path: &str, passphrase: Option<&str>, pool_size: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Every pooled connection needs the key before first use
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            });

            Pool::builder().max_size(pool_size).build(manager)?
        } else {
            let manager = manager.with_init(|conn| {
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            });
            Pool::builder().max_size(pool_size).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "cloak_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block the single writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Accounts (bank accounts)
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                account_type TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Recurring groups (repeating charges)
            CREATE TABLE IF NOT EXISTS recurring_groups (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                merchant_pattern TEXT NOT NULL,
                expected_amount TEXT,                      -- exact decimal
                amount_variance TEXT,                      -- percent, exact decimal
                frequency TEXT NOT NULL,
                last_seen_date DATE,
                next_expected_date DATE,                   -- always derived from last_seen_date
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_recurring_groups_active ON recurring_groups(is_active);

            -- Transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL REFERENCES accounts(id),
                date DATE NOT NULL,
                amount TEXT NOT NULL,                      -- exact decimal, e.g. "-50.00"
                raw_description TEXT NOT NULL,
                clean_merchant TEXT,
                category TEXT,
                import_hash TEXT NOT NULL UNIQUE,          -- dedup safety net
                recurring_group_id INTEGER REFERENCES recurring_groups(id),
                is_recurring BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_recurring ON transactions(recurring_group_id);

            -- Token map (original value <-> pseudonym)
            CREATE TABLE IF NOT EXISTS token_maps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_type TEXT NOT NULL,                  -- merchant, account, person
                original_value TEXT NOT NULL,
                normalized_value TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                metadata TEXT,                             -- JSON object
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(token_type, normalized_value)
            );

            CREATE INDEX IF NOT EXISTS idx_token_maps_type ON token_maps(token_type);

            -- Date shift (singleton)
            CREATE TABLE IF NOT EXISTS date_shifts (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                shift_days INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Privacy settings (singleton)
            CREATE TABLE IF NOT EXISTS privacy_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                obfuscation_enabled BOOLEAN NOT NULL DEFAULT 1,
                ollama_obfuscation BOOLEAN NOT NULL DEFAULT 0,
                openrouter_obfuscation BOOLEAN NOT NULL DEFAULT 1,
                anthropic_obfuscation BOOLEAN NOT NULL DEFAULT 1,
                openai_obfuscation BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
