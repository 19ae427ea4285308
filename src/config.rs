// ⚙️ Configuration
// Built once in main (flags, then environment, then defaults) and passed
// down explicitly.

use crate::export::ExportConfig;
use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH: &str = "transactions.db";
pub const DEFAULT_EXPORT_DIR: &str = "Resources/export";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// SQLite database file
    #[arg(long, env = "TRANSACTIONS_DATABASE", default_value = DEFAULT_DATABASE_PATH)]
    pub database_path: PathBuf,

    /// Directory for generated Excel reports
    #[arg(long, env = "TRANSACTIONS_EXPORT_DIR", default_value = DEFAULT_EXPORT_DIR)]
    pub export_dir: PathBuf,

    /// error, warn, info, debug or trace
    #[arg(long, env = "TRANSACTIONS_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl AppConfig {
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig::new(self.export_dir.clone())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
