//! Token store and date shift operations

use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::{is_unique_violation, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{DateShift, Token, TokenMetadata, TokenType};

const TOKEN_COLUMNS: &str =
    "id, token_type, original_value, normalized_value, token, metadata, created_at";

impl Database {
    fn row_to_token(row: &Row) -> rusqlite::Result<Token> {
        let type_str: String = row.get(1)?;
        let metadata_str: Option<String> = row.get(5)?;
        let created_at_str: String = row.get(6)?;

        let token_type = type_str.parse::<TokenType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(Error::InvalidData(e)),
            )
        })?;

        let metadata = metadata_str
            .map(|s| serde_json::from_str::<TokenMetadata>(&s))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Token {
            id: row.get(0)?,
            token_type,
            original_value: row.get(2)?,
            normalized_value: row.get(3)?,
            token: row.get(4)?,
            metadata,
            created_at: parse_datetime(&created_at_str),
        })
    }

    /// Look up a token by type and normalized value
    pub fn find_token(&self, token_type: TokenType, normalized_value: &str) -> Result<Option<Token>> {
        let conn = self.conn()?;
        let token = conn
            .query_row(
                &format!(
                    "SELECT {} FROM token_maps WHERE token_type = ? AND normalized_value = ?",
                    TOKEN_COLUMNS
                ),
                params![token_type.as_str(), normalized_value],
                Self::row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    /// Look up a token row by its token text (e.g. `MERCHANT_0001`)
    pub fn get_token(&self, token: &str) -> Result<Option<Token>> {
        let conn = self.conn()?;
        let token = conn
            .query_row(
                &format!("SELECT {} FROM token_maps WHERE token = ?", TOKEN_COLUMNS),
                params![token],
                Self::row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    /// Number of tokens issued for a type
    pub fn count_tokens(&self, token_type: TokenType) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM token_maps WHERE token_type = ?",
            params![token_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Create a token for a value, or return the existing one
    ///
    /// The sequence number is `count(type) + 1`. Tokens are never deleted, so
    /// the count is also the highest number issued. Count and insert run in
    /// one `BEGIN IMMEDIATE` transaction, which holds SQLite's write lock
    /// across both statements; the UNIQUE constraints on
    /// `(token_type, normalized_value)` and `token` back this up if another
    /// connection bypasses the transaction.
    pub fn create_token(
        &self,
        token_type: TokenType,
        original_value: &str,
        normalized_value: &str,
        metadata: Option<&TokenMetadata>,
    ) -> Result<Token> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {} FROM token_maps WHERE token_type = ? AND normalized_value = ?",
                    TOKEN_COLUMNS
                ),
                params![token_type.as_str(), normalized_value],
                Self::row_to_token,
            )
            .optional()?;
        if let Some(token) = existing {
            return Ok(token);
        }

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM token_maps WHERE token_type = ?",
            params![token_type.as_str()],
            |row| row.get(0),
        )?;
        let token_text = token_type.format_token(count + 1);

        let metadata_json = metadata
            .filter(|m| !m.is_empty())
            .map(serde_json::to_string)
            .transpose()?;

        let inserted = tx.execute(
            "INSERT INTO token_maps (token_type, original_value, normalized_value, token, metadata)
             VALUES (?, ?, ?, ?, ?)",
            params![
                token_type.as_str(),
                original_value,
                normalized_value,
                token_text,
                metadata_json
            ],
        );

        match inserted {
            Ok(_) => {
                let id = tx.last_insert_rowid();
                let token = tx.query_row(
                    &format!("SELECT {} FROM token_maps WHERE id = ?", TOKEN_COLUMNS),
                    params![id],
                    Self::row_to_token,
                )?;
                tx.commit()?;
                debug!("Issued {} token {}", token_type, token.token);
                Ok(token)
            }
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                let existing = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM token_maps WHERE token_type = ? AND normalized_value = ?",
                            TOKEN_COLUMNS
                        ),
                        params![token_type.as_str(), normalized_value],
                        Self::row_to_token,
                    )
                    .optional()?;
                existing.ok_or_else(|| {
                    Error::InvalidData(format!(
                        "Token {} already issued to a different {} value",
                        token_text, token_type
                    ))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the metadata stored with a token
    pub fn update_token_metadata(&self, token: &str, metadata: &TokenMetadata) -> Result<()> {
        let conn = self.conn()?;
        let metadata_json = if metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(metadata)?)
        };
        let updated = conn.execute(
            "UPDATE token_maps SET metadata = ? WHERE token = ?",
            params![metadata_json, token],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Token {}", token)));
        }
        Ok(())
    }

    /// List tokens, newest first
    pub fn list_tokens(
        &self,
        token_type: Option<TokenType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Token>> {
        let conn = self.conn()?;
        let tokens = if let Some(t) = token_type {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM token_maps WHERE token_type = ? ORDER BY id DESC LIMIT ? OFFSET ?",
                TOKEN_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![t.as_str(), limit, offset], Self::row_to_token)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM token_maps ORDER BY id DESC LIMIT ? OFFSET ?",
                TOKEN_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![limit, offset], Self::row_to_token)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        Ok(tokens)
    }

    /// Every token, in creation order (for cache warm-up)
    pub fn all_tokens(&self) -> Result<Vec<Token>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM token_maps ORDER BY id",
            TOKEN_COLUMNS
        ))?;
        let tokens = stmt
            .query_map([], Self::row_to_token)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    /// The persisted date shift, if one has been generated
    pub fn get_date_shift(&self) -> Result<Option<DateShift>> {
        let conn = self.conn()?;
        let shift = conn
            .query_row(
                "SELECT shift_days, created_at FROM date_shifts WHERE id = 1",
                [],
                |row| {
                    let created_at_str: String = row.get(1)?;
                    Ok(DateShift {
                        shift_days: row.get(0)?,
                        created_at: parse_datetime(&created_at_str),
                    })
                },
            )
            .optional()?;
        Ok(shift)
    }

    /// Persist `candidate_days` as the date shift unless one already exists
    ///
    /// Returns whichever value is stored afterwards; the first write wins.
    pub fn get_or_create_date_shift(&self, candidate_days: i64) -> Result<DateShift> {
        {
            let conn = self.conn()?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO date_shifts (id, shift_days) VALUES (1, ?)",
                params![candidate_days],
            )?;
            if inserted > 0 {
                debug!("Generated installation date shift");
            }
        }

        self.get_date_shift()?
            .ok_or_else(|| Error::NotFound("date shift".to_string()))
    }
}
