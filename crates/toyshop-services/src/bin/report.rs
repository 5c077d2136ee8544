//! # Financial Report
//!
//! Prints the dashboard snapshot for the configured database as JSON.
//!
//! ## Usage
//! ```bash
//! cargo run -p toyshop-services --bin toyshop-report
//! cargo run -p toyshop-services --bin toyshop-report -- --config ./store.toml
//! RUST_LOG=debug cargo run -p toyshop-services --bin toyshop-report
//! ```

use std::env;
use std::path::PathBuf;

use toyshop_db::Database;
use toyshop_services::{ReportingService, StoreConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,toyshop=debug,sqlx=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Toyshop Financial Report");
                println!();
                println!("Usage: toyshop-report [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = StoreConfig::load(config_path)?;
    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %db_path.display(), "Opening database");

    let db = Database::new(config.db_config()?).await?;
    let stats = ReportingService::new(db.clone(), config.report_limits())
        .financial_stats()
        .await?;

    println!("{}", serde_json::to_string_pretty(&stats)?);

    db.close().await;
    Ok(())
}
