use crate::error::Result;
use crate::filter::DateRange;
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Fixed-width storage format: lexical order == chronological order.
pub const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

pub const DEFAULT_STATUS: &str = "Pending";

/// Transaction as persisted and served
///
/// `transaction_date` is wall-clock time in `timezone`, never UTC.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    pub name: String,
    pub email: String,
    pub amount: Decimal,
    pub transaction_date: NaiveDateTime,

    /// Raw "latitude,longitude" as received
    pub client_location: String,

    /// IANA zone derived from `client_location` at import time
    #[serde(rename = "timeZone")]
    pub timezone: String,

    pub status: String,
}

/// Outcome of one upsert batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            transaction_id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            amount TEXT NOT NULL,
            transaction_date TEXT NOT NULL,
            client_location TEXT NOT NULL,
            timezone TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_date ON transactions(transaction_date)",
        [],
    )?;

    Ok(())
}

fn format_date(date: &NaiveDateTime) -> String {
    date.format(DATE_STORAGE_FORMAT).to_string()
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount_text: String = row.get(3)?;
    let date_text: String = row.get(4)?;

    let amount = Decimal::from_str(&amount_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let transaction_date = NaiveDateTime::parse_from_str(&date_text, DATE_STORAGE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Transaction {
        transaction_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        amount,
        transaction_date,
        client_location: row.get(5)?,
        timezone: row.get(6)?,
        status: row.get(7)?,
    })
}

const SELECT_COLUMNS: &str = "SELECT transaction_id, name, email, amount, transaction_date,
                client_location, timezone, status
         FROM transactions";

/// Insert new rows; on an existing `transaction_id` only `status` is overwritten.
///
/// The batch runs in a single SQLite transaction, so a failure leaves the
/// store untouched.
pub fn upsert_transactions(conn: &Connection, transactions: &[Transaction]) -> Result<UpsertSummary> {
    let db_tx = conn.unchecked_transaction()?;
    let mut summary = UpsertSummary::default();

    {
        let mut exists = db_tx.prepare("SELECT 1 FROM transactions WHERE transaction_id = ?1")?;
        let mut upsert = db_tx.prepare(
            "INSERT INTO transactions (
                transaction_id, name, email, amount, transaction_date,
                client_location, timezone, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (transaction_id) DO UPDATE SET
                status = excluded.status",
        )?;

        for tx in transactions {
            let existed = exists.exists(params![tx.transaction_id])?;

            upsert.execute(params![
                tx.transaction_id,
                tx.name,
                tx.email,
                tx.amount.to_string(),
                format_date(&tx.transaction_date),
                tx.client_location,
                tx.timezone,
                tx.status,
            ])?;

            if existed {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }
    }

    db_tx.commit()?;
    debug!(inserted = summary.inserted, updated = summary.updated, "upsert batch committed");

    Ok(summary)
}

pub fn get_all_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(SELECT_COLUMNS)?;

    let transactions = stmt
        .query_map([], row_to_transaction)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(transactions)
}

pub fn get_transaction(conn: &Connection, transaction_id: &str) -> Result<Option<Transaction>> {
    let sql = format!("{} WHERE transaction_id = ?1", SELECT_COLUMNS);

    let transaction = conn
        .query_row(&sql, params![transaction_id], row_to_transaction)
        .optional()?;

    Ok(transaction)
}

/// Stored-local-time range query, inclusive, ascending by `transaction_date`
pub fn get_transactions_in_range(conn: &Connection, range: &DateRange) -> Result<Vec<Transaction>> {
    let sql = format!(
        "{} WHERE transaction_date >= ?1 AND transaction_date <= ?2
         ORDER BY transaction_date",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let transactions = stmt
        .query_map(
            params![format_date(&range.start()), format_date(&range.end())],
            row_to_transaction,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(transactions)
}

pub fn delete_all_transactions(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM transactions", [])?;
    Ok(deleted)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}
