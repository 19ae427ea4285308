// 📥 CSV Import
// Raw CSV rows → Transaction, with the zone resolved from coordinates.
//
// Policy: a malformed row rejects the whole file. Nothing is returned (and
// so nothing is persisted) unless every row parses.

use crate::db::{Transaction, DEFAULT_STATUS};
use crate::error::{Result, TransactionError};
use crate::timezone::{resolve_stored_zone, TimezoneLookup};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;
use tracing::{info, warn};

// ============================================================================
// RAW ROW
// ============================================================================

/// One CSV row exactly as written in the file
#[derive(Debug, Clone, Deserialize)]
pub struct CsvRecord {
    pub transaction_id: String,
    pub name: String,
    pub email: String,
    pub amount: String,
    pub transaction_date: String,
    pub client_location: String,
    #[serde(default)]
    pub status: String,
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// Parse a currency string such as `$1,234.56`, `(12.00)` or `-7`.
///
/// Empty input is zero.
pub fn parse_amount(text: &str) -> std::result::Result<Decimal, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let mut cleaned: String = trimmed.replace('$', "");
    cleaned = cleaned.trim().to_string();

    let mut negative = false;
    if cleaned.starts_with('(') && cleaned.ends_with(')') {
        negative = true;
        cleaned = cleaned[1..cleaned.len() - 1].trim().to_string();
    }
    if let Some(rest) = cleaned.strip_suffix('-') {
        negative = !negative;
        cleaned = rest.trim().to_string();
    }
    if let Some(rest) = cleaned.strip_prefix('-') {
        negative = !negative;
        cleaned = rest.trim().to_string();
    } else if let Some(rest) = cleaned.strip_prefix('+') {
        cleaned = rest.trim().to_string();
    }

    // Thousands separators only belong in the integer part
    let (integer, fraction) = match cleaned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (cleaned.as_str(), None),
    };
    if fraction.map_or(false, |f| f.contains(',')) {
        return Err("thousands separator after decimal point".to_string());
    }
    let integer = integer.replace(',', "");
    if integer.is_empty() && fraction.map_or(true, str::is_empty) {
        return Err("no digits".to_string());
    }
    if !integer.chars().all(|c| c.is_ascii_digit())
        || !fraction.map_or(true, |f| f.chars().all(|c| c.is_ascii_digit()))
    {
        return Err("not a number".to_string());
    }

    let normalized = match fraction {
        Some(f) if !f.is_empty() => format!("{}.{}", if integer.is_empty() { "0" } else { integer.as_str() }, f),
        _ => integer,
    };

    let value = Decimal::from_str(&normalized).map_err(|e| e.to_string())?;
    Ok(if negative { -value } else { value })
}

/// Parse `"latitude,longitude"`.
pub fn parse_coordinates(text: &str) -> std::result::Result<(f64, f64), String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err("expected \"latitude,longitude\"".to_string());
    }

    let latitude: f64 = parts[0].parse().map_err(|_| "latitude is not a number".to_string())?;
    let longitude: f64 = parts[1].parse().map_err(|_| "longitude is not a number".to_string())?;

    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err("latitude out of range".to_string());
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err("longitude out of range".to_string());
    }

    Ok((latitude, longitude))
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a naive timestamp. Date-only input means midnight.
/// Anything carrying a UTC offset is rejected.
pub fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

// ============================================================================
// IMPORTER
// ============================================================================

pub struct CsvImporter {
    lookup: Box<dyn TimezoneLookup>,
}

impl CsvImporter {
    pub fn new(lookup: Box<dyn TimezoneLookup>) -> Self {
        CsvImporter { lookup }
    }

    /// Parse every row of `reader`, stamping each with its IANA zone.
    pub fn import<R: Read>(&self, reader: R) -> Result<Vec<Transaction>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut transactions = Vec::new();

        for (index, result) in rdr.deserialize::<CsvRecord>().enumerate() {
            let row = index + 1;
            let record = result?;

            let transaction = self.convert(row, record).map_err(|e| {
                warn!(row, error = %e, "rejecting CSV import");
                e
            })?;
            transactions.push(transaction);
        }

        info!(rows = transactions.len(), "parsed CSV import");
        Ok(transactions)
    }

    fn convert(&self, row: usize, record: CsvRecord) -> Result<Transaction> {
        if record.transaction_id.is_empty() {
            return Err(TransactionError::parsing(row, "transaction_id", "", "required"));
        }

        let amount = parse_amount(&record.amount)
            .map_err(|reason| TransactionError::parsing(row, "amount", &record.amount, reason))?;

        let transaction_date = parse_naive_datetime(&record.transaction_date).ok_or_else(|| {
            TransactionError::parsing(row, "transaction_date", &record.transaction_date, "unrecognized date")
        })?;

        let (latitude, longitude) = parse_coordinates(&record.client_location).map_err(|reason| {
            TransactionError::parsing(row, "client_location", &record.client_location, reason)
        })?;

        let timezone = self.lookup.resolve(latitude, longitude)?;
        // Stored zones must always resolve later
        resolve_stored_zone(&timezone)?;

        let status = if record.status.is_empty() {
            DEFAULT_STATUS.to_string()
        } else {
            record.status
        };

        Ok(Transaction {
            transaction_id: record.transaction_id,
            name: record.name,
            email: record.email,
            amount,
            transaction_date,
            client_location: record.client_location,
            timezone,
            status,
        })
    }
}
