// 📊 Excel Export
// Writes transactions to an .xlsx report, one row per transaction in the
// order given.

use crate::db::Transaction;
use crate::error::Result;
use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SHEET_NAME: &str = "Transactions";

pub const DATE_NUMBER_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

const MIN_DATE_COLUMN_WIDTH: f64 = 20.0;

/// Column headers, in entity field order
pub const HEADERS: [&str; 8] = [
    "TransactionId",
    "Name",
    "Email",
    "Amount",
    "TransactionDate",
    "ClientLocation",
    "Status",
    "TimeZone",
];

const DATE_COLUMN: u16 = 4;

/// Where reports land. Passed in at construction; there is no global state.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub export_dir: PathBuf,
}

impl ExportConfig {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        ExportConfig {
            export_dir: export_dir.into(),
        }
    }
}

/// `Transactions_Report_yyyyMMddHHmmss`
pub fn report_file_stem(now: NaiveDateTime) -> String {
    format!("Transactions_Report_{}", now.format("%Y%m%d%H%M%S"))
}

pub struct ExcelExporter {
    config: ExportConfig,
}

impl ExcelExporter {
    pub fn new(config: ExportConfig) -> Self {
        ExcelExporter { config }
    }

    pub fn export_dir(&self) -> &Path {
        &self.config.export_dir
    }

    /// Write `<export_dir>/<file_stem>.xlsx`, creating the directory if needed.
    pub fn export(&self, transactions: &[Transaction], file_stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.export_dir)?;
        let path = self.config.export_dir.join(format!("{}.xlsx", file_stem));

        let header_format = Format::new().set_bold().set_font_size(12);
        let date_format = Format::new().set_num_format(DATE_NUMBER_FORMAT);

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (index, tx) in transactions.iter().enumerate() {
            let row = index as u32 + 1;

            worksheet.write_string(row, 0, tx.transaction_id.as_str())?;
            worksheet.write_string(row, 1, tx.name.as_str())?;
            worksheet.write_string(row, 2, tx.email.as_str())?;
            worksheet.write_number(row, 3, tx.amount.to_f64().unwrap_or_default())?;
            worksheet.write_datetime_with_format(row, DATE_COLUMN, &tx.transaction_date, &date_format)?;
            worksheet.write_string(row, 5, tx.client_location.as_str())?;
            worksheet.write_string(row, 6, tx.status.as_str())?;
            worksheet.write_string(row, 7, tx.timezone.as_str())?;
        }

        worksheet.autofit();
        worksheet.set_column_width(DATE_COLUMN, MIN_DATE_COLUMN_WIDTH)?;

        workbook.save(&path)?;
        info!(rows = transactions.len(), path = %path.display(), "exported transactions to Excel");

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn create_test_transaction(id: &str, day: u32) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            amount: Decimal::new(4250, 2),
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            client_location: "50.4501,30.5234".to_string(),
            timezone: "Europe/Kiev".to_string(),
            status: "Completed".to_string(),
        }
    }

    #[test]
    fn test_report_file_stem() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(7, 5, 3).unwrap();
        assert_eq!(report_file_stem(now), "Transactions_Report_20240309070503");
    }

    #[test]
    fn test_export_writes_header_and_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ExcelExporter::new(ExportConfig::new(dir.path().join("nested/export")));

        let transactions = vec![create_test_transaction("T-2", 2), create_test_transaction("T-1", 1)];
        let path = exporter.export(&transactions, "report").unwrap();

        assert_eq!(path, dir.path().join("nested/export/report.xlsx"));
        assert!(path.exists());

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();

        assert_eq!(range.get_size(), (3, HEADERS.len()));
        for (col, header) in HEADERS.iter().enumerate() {
            assert_eq!(range.get_value((0, col as u32)), Some(&Data::String(header.to_string())));
        }
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("T-2".to_string())));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("T-1".to_string())));
        assert_eq!(range.get_value((1, 3)), Some(&Data::Float(42.5)));
        assert_eq!(range.get_value((1, 7)), Some(&Data::String("Europe/Kiev".to_string())));
    }

    #[test]
    fn test_export_empty_collection_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ExcelExporter::new(ExportConfig::new(dir.path()));

        let path = exporter.export(&[], "empty").unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.get_size(), (1, HEADERS.len()));
    }
}
