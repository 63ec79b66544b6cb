use clap::Parser;
use common::config::Config;
use sea_orm::Database;
use shop::http::{self, AppState, initialize_tracing};
use shop::notify::BroadcastSink;
use shop::order_store::OrderStore;
use shop::schema;
use shop::shipping::ProvinceDirectory;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    println!("Loading config from: {}", args.config);
    let config = Config::load(&args.config)?;
    initialize_tracing(&config.backend.log_level);

    let db = Database::connect(&config.common.database_url).await?;
    if config.backend.auto_migrate {
        schema::create_tables(&db).await?;
    }

    let sink = Arc::new(BroadcastSink::new(64));
    let store = Arc::new(OrderStore::new(db, sink));
    let provinces = Arc::new(ProvinceDirectory::new(
        config.backend.provinces_url.clone(),
        Duration::from_secs(config.backend.provinces_ttl_secs.unwrap_or(3600)),
    ));

    http::run_backend(config.backend, AppState { store, provinces }).await
}
