use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use transactions_api::logging::{init_logging, parse_log_level};
use transactions_api::{
    parse_naive_datetime, verify_count, AppConfig, DateRange, GeoTimezoneLookup, RangeReport,
    TransactionService,
};

#[derive(Parser)]
#[command(name = "transactions", version, about = "Import, query and export transactions")]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a CSV file (existing ids only get their status updated)
    Import { csv: PathBuf },

    /// Export every transaction to an Excel report
    Export,

    /// Transactions in a date range
    Range {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Interpret the range in this IANA zone instead of each record's local time
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long)]
        excel: bool,
    },

    /// Transactions in one calendar month, by local time
    Month {
        year: i32,
        month: u32,
        #[arg(long)]
        excel: bool,
    },

    /// Delete every transaction
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(parse_log_level(&cli.config.log_level));

    let service = TransactionService::open(&cli.config, Box::new(GeoTimezoneLookup::new()))
        .context("Failed to open database")?;

    match cli.command {
        Command::Import { csv } => run_import(&service, &csv)?,
        Command::Export => {
            let path = service.export_all()?;
            println!("✓ Exported to {}", path.display());
        }
        Command::Range { start, end, timezone, excel } => {
            let range = DateRange::new(parse_date(&start)?, parse_date(&end)?)?;
            let report = match timezone {
                Some(zone) => service.transactions_in_user_timezone(&range, &zone, excel)?,
                None => service.transactions_in_local_time(&range, excel)?,
            };
            print_report(&report);
        }
        Command::Month { year, month, excel } => {
            let report = service.transactions_for_month(year, month, excel)?;
            print_report(&report);
        }
        Command::Clear => {
            let deleted = service.delete_all()?;
            println!("✓ Deleted {} transactions", deleted);
        }
    }

    Ok(())
}

fn run_import(service: &TransactionService, csv_path: &PathBuf) -> Result<()> {
    println!("📂 Importing {}", csv_path.display());

    let file = File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    let outcome = service.import_csv(BufReader::new(file))?;

    println!("✓ Inserted: {} transactions", outcome.summary.inserted);
    println!("✓ Status updated: {} transactions", outcome.summary.updated);
    println!("✓ Database contains {} transactions", verify_count(service.connection())?);

    Ok(())
}

fn parse_date(text: &str) -> Result<chrono::NaiveDateTime> {
    parse_naive_datetime(text).with_context(|| format!("Invalid date: {}", text))
}

fn print_report(report: &RangeReport) {
    for tx in &report.transactions {
        println!(
            "{}  {:<12} {:>12}  {:<24} {}",
            tx.transaction_date, tx.transaction_id, tx.amount, tx.timezone, tx.status
        );
    }
    println!("✓ {} transactions", report.transactions.len());

    if let Some(path) = &report.export_path {
        println!("✓ Exported to {}", path.display());
    }
}
