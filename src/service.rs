// 🧭 Transaction Service
// Use-case layer shared by the CLI and the HTTP server: import, export,
// range queries and bulk clear over one SQLite connection.

use crate::config::AppConfig;
use crate::db::{
    delete_all_transactions, get_all_transactions, get_transactions_in_range, setup_database,
    upsert_transactions, Transaction, UpsertSummary,
};
use crate::error::{Result, TransactionError};
use crate::export::{report_file_stem, ExcelExporter, ExportConfig};
use crate::filter::{filter_in_timezone, DateRange};
use crate::parser::CsvImporter;
use crate::timezone::TimezoneLookup;
use chrono::Local;
use rusqlite::Connection;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

/// Result of importing one CSV file
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub transactions: Vec<Transaction>,
    pub summary: UpsertSummary,
}

/// Transactions selected by a range query, plus the report path when an
/// Excel export was requested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeReport {
    pub transactions: Vec<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,
}

pub struct TransactionService {
    conn: Connection,
    importer: CsvImporter,
    exporter: ExcelExporter,
}

impl TransactionService {
    /// Wrap an open connection, creating the schema if it is missing.
    pub fn new(conn: Connection, lookup: Box<dyn TimezoneLookup>, export: ExportConfig) -> Result<Self> {
        setup_database(&conn)?;
        Ok(TransactionService {
            conn,
            importer: CsvImporter::new(lookup),
            exporter: ExcelExporter::new(export),
        })
    }

    /// Open the database named in `config`.
    pub fn open(config: &AppConfig, lookup: Box<dyn TimezoneLookup>) -> Result<Self> {
        let conn = Connection::open(&config.database_path)?;
        info!(path = %config.database_path.display(), "database opened");
        Self::new(conn, lookup, config.export_config())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Parse the whole file first, then upsert it in one batch.
    pub fn import_csv<R: Read>(&self, reader: R) -> Result<ImportOutcome> {
        let transactions = self.importer.import(reader)?;
        let summary = upsert_transactions(&self.conn, &transactions)?;

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            "imported transactions"
        );

        Ok(ImportOutcome { transactions, summary })
    }

    /// Export every stored transaction. Fails with `NotFound` on an empty store.
    pub fn export_all(&self) -> Result<PathBuf> {
        let transactions = get_all_transactions(&self.conn)?;
        if transactions.is_empty() {
            return Err(TransactionError::NotFound("No transactions found.".to_string()));
        }

        self.write_report(&transactions)
    }

    /// Range expressed in `user_zone`; each record converted from its own zone.
    pub fn transactions_in_user_timezone(
        &self,
        range: &DateRange,
        user_zone: &str,
        excel_export: bool,
    ) -> Result<RangeReport> {
        let all = get_all_transactions(&self.conn)?;
        let transactions = filter_in_timezone(all, range, user_zone)?;
        self.finish(transactions, excel_export)
    }

    /// Range compared against each record's own stored local time.
    pub fn transactions_in_local_time(&self, range: &DateRange, excel_export: bool) -> Result<RangeReport> {
        let transactions = get_transactions_in_range(&self.conn, range)?;
        self.finish(transactions, excel_export)
    }

    pub fn transactions_for_month(&self, year: i32, month: u32, excel_export: bool) -> Result<RangeReport> {
        let range = DateRange::month(year, month)?;
        self.transactions_in_local_time(&range, excel_export)
    }

    pub fn delete_all(&self) -> Result<usize> {
        let deleted = delete_all_transactions(&self.conn)?;
        warn!(deleted, "deleted all transactions");
        Ok(deleted)
    }

    fn finish(&self, transactions: Vec<Transaction>, excel_export: bool) -> Result<RangeReport> {
        let export_path = if excel_export {
            Some(self.write_report(&transactions)?)
        } else {
            None
        };

        Ok(RangeReport {
            transactions,
            export_path,
        })
    }

    fn write_report(&self, transactions: &[Transaction]) -> Result<PathBuf> {
        let stem = report_file_stem(Local::now().naive_local());
        self.exporter.export(transactions, &stem)
    }
}
