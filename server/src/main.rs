mod config;
mod error;
mod logging;
mod store;
mod voting;
mod web;

use std::env;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};

use config::{Config, ConfigError, StoreBackend};
use store::{seed_demo, MemoryStore, PostgresStore, Store};
use web::AppState;

const DEFAULT_DEMO_ADMIN: &str = "admin@example.com";

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let store = connect_store(config).await?;
    if config.seed_demo_data {
        let admin = config.admin_emails.first().map(String::as_str).unwrap_or(DEFAULT_DEMO_ADMIN);
        match seed_demo(&*store, admin, Utc::now()).await.context("Failed to seed demo data")? {
            Some(summary) => info!(admin = %summary.admin, email = admin, voters = summary.voters, "Demo data ready"),
            None => info!("Store already has projects, demo data not seeded"),
        }
    }
    Ok(store)
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let store = PostgresStore::connect(url, config.database_max_connections)
                .context("Failed to connect to database")?;
            let applied = store.run_migrations().await.context("Failed to run database migrations")?;
            if applied.is_empty() {
                info!("Database schema is up to date");
            } else {
                info!(count = applied.len(), versions = ?applied, "Applied database migrations");
            }
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, nothing will survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging(env::var("LOG_LEVEL").ok().as_deref());
    info!("Starting hackvote server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        identity = ?config.identity_source,
        scoring = ?config.scoring_mode,
        admins = config.admin_emails.len(),
        "Voting rules"
    );

    let store = open_store(&config).await?;
    let addr = config.bind_addr;
    web::serve(AppState::new(store, config), addr).await?;

    info!("Server stopped");
    Ok(())
}
