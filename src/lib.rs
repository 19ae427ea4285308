// Transactions API - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod logging;
pub mod parser;
pub mod service;
pub mod timezone;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{
    Transaction, UpsertSummary,
    setup_database, upsert_transactions, get_all_transactions, get_transaction,
    get_transactions_in_range, delete_all_transactions, verify_count,
};
pub use error::{Result, TransactionError};
pub use export::{ExcelExporter, ExportConfig, report_file_stem};
pub use filter::{DateRange, filter_in_local_time, filter_in_timezone};
pub use parser::{CsvImporter, CsvRecord, parse_amount, parse_coordinates, parse_naive_datetime};
pub use service::{ImportOutcome, RangeReport, TransactionService};
pub use timezone::{
    GeoTimezoneLookup, TimezoneLookup,
    convert_local_time, normalize_zone_id, resolve_stored_zone, resolve_zone, to_instant,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
