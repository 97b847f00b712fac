//! Account and transaction operations

use rusqlite::{params, OptionalExtension, Row};

use super::{is_unique_violation, parse_date, parse_datetime, parse_decimal, Database};
use crate::error::Result;
use crate::models::{Account, AccountType, NewTransaction, Transaction};

const TRANSACTION_COLUMNS: &str = "id, account_id, date, amount, raw_description, clean_merchant, \
     category, import_hash, recurring_group_id, is_recurring, created_at";

/// Result of inserting a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionInsertResult {
    /// Transaction was inserted successfully, contains new transaction ID
    Inserted(i64),
    /// Transaction was a duplicate, contains existing transaction ID
    Duplicate(i64),
}

impl Database {
    /// Create or get an account by name
    pub fn upsert_account(&self, name: &str, account_type: Option<AccountType>) -> Result<i64> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM accounts WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES (?, ?)",
            params![name, account_type.map(|t| t.as_str())],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List all accounts
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, account_type, created_at FROM accounts ORDER BY name")?;

        let accounts = stmt
            .query_map([], |row| {
                let account_type_str: Option<String> = row.get(2)?;
                let created_at_str: String = row.get(3)?;

                Ok(Account {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    account_type: account_type_str.and_then(|s| s.parse().ok()),
                    created_at: parse_datetime(&created_at_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Check whether a transaction with this fingerprint is already stored
    ///
    /// A fast path only: a concurrent insert can land between this check and
    /// the caller's insert. The UNIQUE index on `import_hash` is what actually
    /// guarantees at most one row per fingerprint.
    pub fn is_duplicate(&self, import_hash: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE import_hash = ?)",
            params![import_hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Insert a transaction unless its fingerprint is already stored
    ///
    /// A UNIQUE violation on `import_hash` (lost race with another writer) is
    /// reported as a duplicate rather than an error.
    pub fn insert_transaction(
        &self,
        account_id: i64,
        tx: &NewTransaction,
    ) -> Result<TransactionInsertResult> {
        if let Some(existing_id) = self.find_transaction_id_by_hash(&tx.import_hash)? {
            return Ok(TransactionInsertResult::Duplicate(existing_id));
        }

        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT INTO transactions (account_id, date, amount, raw_description, clean_merchant, category, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                account_id,
                tx.date.to_string(),
                tx.amount.to_string(),
                tx.raw_description,
                tx.clean_merchant,
                tx.category,
                tx.import_hash,
            ],
        );

        match inserted {
            Ok(_) => Ok(TransactionInsertResult::Inserted(conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => {
                drop(conn);
                let existing_id = self.find_transaction_id_by_hash(&tx.import_hash)?;
                match existing_id {
                    Some(id) => Ok(TransactionInsertResult::Duplicate(id)),
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_transaction_id_by_hash(&self, import_hash: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM transactions WHERE import_hash = ?",
                params![import_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(2)?;
        let amount_str: String = row.get(3)?;
        let created_at_str: String = row.get(10)?;

        Ok(Transaction {
            id: row.get(0)?,
            account_id: row.get(1)?,
            date: parse_date(&date_str)?,
            amount: parse_decimal(&amount_str)?,
            raw_description: row.get(4)?,
            clean_merchant: row.get(5)?,
            category: row.get(6)?,
            import_hash: row.get(7)?,
            recurring_group_id: row.get(8)?,
            is_recurring: row.get(9)?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    /// Find the stored transaction with a fingerprint
    pub fn find_transaction_by_hash(&self, import_hash: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE import_hash = ?",
                    TRANSACTION_COLUMNS
                ),
                params![import_hash],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
                params![id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// List transactions, most recent first
    pub fn list_transactions(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS
        ))?;
        let transactions = stmt
            .query_map(params![limit, offset], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Number of stored rows carrying a fingerprint (0 or 1)
    pub fn count_transactions_with_hash(&self, import_hash: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE import_hash = ?",
            params![import_hash],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Total number of stored transactions
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }
}
