// Transactions API - Web Server

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use transactions_api::api::{router, AppState};
use transactions_api::logging::{init_logging, parse_log_level};
use transactions_api::{AppConfig, GeoTimezoneLookup, TransactionService};

#[derive(Parser)]
#[command(name = "transactions-server", version, about = "Transactions REST API")]
struct ServerArgs {
    #[command(flatten)]
    config: AppConfig,

    /// Address to listen on
    #[arg(long, env = "TRANSACTIONS_BIND", default_value = "0.0.0.0:3000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_logging(parse_log_level(&args.config.log_level));

    let service = TransactionService::open(&args.config, Box::new(GeoTimezoneLookup::new()))
        .context("Failed to open database")?;
    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", args.bind))?;

    info!(addr = %args.bind, "server listening");
    info!("API: http://{}/api/transaction", args.bind);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
