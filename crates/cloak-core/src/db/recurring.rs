//! Recurring group operations
//!
//! `next_expected_date` is never written directly; every change to
//! `last_seen_date` goes through [`next_expected`] so the two stay in step.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{parse_date, parse_datetime, parse_decimal, Database};
use crate::error::{Error, Result};
use crate::models::{
    Frequency, NewRecurringGroup, RecurringDetection, RecurringGroup, RecurringTarget,
};
use crate::recurrence::next_expected;

const GROUP_COLUMNS: &str = "id, name, merchant_pattern, expected_amount, amount_variance, \
     frequency, last_seen_date, next_expected_date, is_active, created_at";

/// Variance in percent applied to groups created without one
pub const DEFAULT_AMOUNT_VARIANCE: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

impl Database {
    fn row_to_group(row: &Row) -> rusqlite::Result<RecurringGroup> {
        let expected_amount: Option<String> = row.get(3)?;
        let amount_variance: Option<String> = row.get(4)?;
        let frequency_str: String = row.get(5)?;
        let last_seen: Option<String> = row.get(6)?;
        let next_expected_str: Option<String> = row.get(7)?;
        let created_at_str: String = row.get(9)?;

        Ok(RecurringGroup {
            id: row.get(0)?,
            name: row.get(1)?,
            merchant_pattern: row.get(2)?,
            expected_amount: expected_amount.as_deref().map(parse_decimal).transpose()?,
            amount_variance: amount_variance.as_deref().map(parse_decimal).transpose()?,
            frequency: frequency_str.parse().ok(),
            last_seen_date: last_seen.as_deref().map(parse_date).transpose()?,
            next_expected_date: next_expected_str.as_deref().map(parse_date).transpose()?,
            is_active: row.get(8)?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    fn insert_recurring_group(conn: &Connection, group: &NewRecurringGroup) -> Result<i64> {
        let next = group
            .last_seen_date
            .map(|d| next_expected(d, Some(group.frequency)));

        conn.execute(
            r#"
            INSERT INTO recurring_groups (name, merchant_pattern, expected_amount, amount_variance,
                                          frequency, last_seen_date, next_expected_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                group.name,
                group.merchant_pattern,
                group.expected_amount.map(|a| a.to_string()),
                group.amount_variance.map(|v| v.to_string()),
                group.frequency.as_str(),
                group.last_seen_date.map(|d| d.to_string()),
                next.map(|d| d.to_string()),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Created recurring group {} ({})", id, group.frequency);
        Ok(id)
    }

    /// Create a recurring group; returns its ID
    pub fn create_recurring_group(&self, group: &NewRecurringGroup) -> Result<i64> {
        let conn = self.conn()?;
        Self::insert_recurring_group(&conn, group)
    }

    /// Get a recurring group by ID
    pub fn get_recurring_group(&self, id: i64) -> Result<Option<RecurringGroup>> {
        let conn = self.conn()?;
        let group = conn
            .query_row(
                &format!("SELECT {} FROM recurring_groups WHERE id = ?", GROUP_COLUMNS),
                params![id],
                Self::row_to_group,
            )
            .optional()?;
        Ok(group)
    }

    /// List recurring groups ordered by name
    pub fn list_recurring_groups(&self, include_inactive: bool) -> Result<Vec<RecurringGroup>> {
        let conn = self.conn()?;
        let sql = if include_inactive {
            format!("SELECT {} FROM recurring_groups ORDER BY name", GROUP_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM recurring_groups WHERE is_active = 1 ORDER BY name",
                GROUP_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let groups = stmt
            .query_map([], Self::row_to_group)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// Number of transactions linked to a group
    pub fn group_transaction_count(&self, group_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE recurring_group_id = ?",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Activate or deactivate a group
    pub fn set_recurring_group_active(&self, group_id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE recurring_groups SET is_active = ? WHERE id = ?",
            params![active, group_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Recurring group {}", group_id)));
        }
        Ok(())
    }

    /// Record a charge seen on `date`
    ///
    /// Moves `last_seen_date` forward (never back) and reprojects
    /// `next_expected_date`. Returns the updated group.
    pub fn record_recurring_seen(&self, group_id: i64, date: NaiveDate) -> Result<RecurringGroup> {
        let group = self
            .get_recurring_group(group_id)?
            .ok_or_else(|| Error::NotFound(format!("Recurring group {}", group_id)))?;

        if group.last_seen_date.map_or(true, |last| date > last) {
            let next = next_expected(date, group.frequency);
            let conn = self.conn()?;
            conn.execute(
                "UPDATE recurring_groups SET last_seen_date = ?, next_expected_date = ? WHERE id = ?",
                params![date.to_string(), next.to_string(), group_id],
            )?;
        }

        self.get_recurring_group(group_id)?
            .ok_or_else(|| Error::NotFound(format!("Recurring group {}", group_id)))
    }

    /// Create a group from an AI detection result and link its transactions
    ///
    /// Runs in one transaction: on any error neither the group nor the links
    /// are stored.
    pub fn create_group_from_detection(
        &self,
        detection: &RecurringDetection,
    ) -> Result<RecurringGroup> {
        let frequency: Frequency = detection
            .frequency
            .parse()
            .map_err(Error::InvalidData)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let group_id = Self::insert_recurring_group(
            &tx,
            &NewRecurringGroup {
                name: detection.suggested_name.clone(),
                merchant_pattern: detection.merchant_pattern.clone(),
                expected_amount: Some(detection.average_amount.abs()),
                amount_variance: Some(DEFAULT_AMOUNT_VARIANCE),
                frequency,
                last_seen_date: None,
            },
        )?;

        let mut most_recent: Option<NaiveDate> = None;
        for tx_id in &detection.transaction_ids {
            let updated = tx.execute(
                "UPDATE transactions SET recurring_group_id = ?, is_recurring = 1 WHERE id = ?",
                params![group_id, tx_id],
            )?;
            if updated == 0 {
                continue;
            }
            let date_str: String = tx.query_row(
                "SELECT date FROM transactions WHERE id = ?",
                params![tx_id],
                |row| row.get(0),
            )?;
            let date = parse_date(&date_str)?;
            most_recent = Some(most_recent.map_or(date, |d| d.max(date)));
        }

        if let Some(date) = most_recent {
            tx.execute(
                "UPDATE recurring_groups SET last_seen_date = ?, next_expected_date = ? WHERE id = ?",
                params![
                    date.to_string(),
                    next_expected(date, Some(frequency)).to_string(),
                    group_id
                ],
            )?;
        }

        tx.commit()?;
        drop(conn);

        info!(
            "Created recurring group {} from detection ({} transactions)",
            group_id,
            detection.transaction_ids.len()
        );

        self.get_recurring_group(group_id)?
            .ok_or_else(|| Error::NotFound(format!("Recurring group {}", group_id)))
    }

    /// Mark a transaction as recurring, linking it to an existing or new group
    pub fn mark_transaction_recurring(
        &self,
        transaction_id: i64,
        target: RecurringTarget,
    ) -> Result<RecurringGroup> {
        let tx = self
            .get_transaction(transaction_id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", transaction_id)))?;

        let group_id = match target {
            RecurringTarget::Existing(id) => {
                self.get_recurring_group(id)?
                    .ok_or_else(|| Error::NotFound(format!("Recurring group {}", id)))?;
                id
            }
            RecurringTarget::New { name, frequency } => {
                let merchant = tx
                    .clean_merchant
                    .clone()
                    .unwrap_or_else(|| tx.raw_description.clone());
                self.create_recurring_group(&NewRecurringGroup {
                    name: name.unwrap_or_else(|| merchant.clone()),
                    merchant_pattern: merchant,
                    expected_amount: Some(tx.amount.abs()),
                    amount_variance: Some(DEFAULT_AMOUNT_VARIANCE),
                    frequency: frequency.unwrap_or(Frequency::Monthly),
                    last_seen_date: None,
                })?
            }
        };

        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE transactions SET recurring_group_id = ?, is_recurring = 1 WHERE id = ?",
                params![group_id, transaction_id],
            )?;
        }

        self.record_recurring_seen(group_id, tx.date)
    }

    /// Remove a transaction from its recurring group
    ///
    /// The group's dates are left as they are.
    pub fn unmark_transaction_recurring(&self, transaction_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET recurring_group_id = NULL, is_recurring = 0 WHERE id = ?",
            params![transaction_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Transaction {}", transaction_id)));
        }
        Ok(())
    }
}
