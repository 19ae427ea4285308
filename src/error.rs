// ⚠️ Error Taxonomy
// Client-input failures vs internal faults, shared by CLI and HTTP

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Unknown time zone [{zone}]")]
    ZoneResolution { zone: String },

    #[error("{0}")]
    Validation(String),

    #[error("Row {row}: invalid {field} [{value}]: {reason}")]
    Parsing {
        row: usize,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Excel export failed: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

impl TransactionError {
    pub fn zone(zone: impl Into<String>) -> Self {
        Self::ZoneResolution { zone: zone.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn parsing(row: usize, field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Parsing {
            row,
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the caller can fix the failure by changing its input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ZoneResolution { .. }
                | Self::Validation(_)
                | Self::Parsing { .. }
                | Self::Csv(_)
                | Self::NotFound(_)
        )
    }
}
