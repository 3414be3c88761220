//! bank_ledger gateway
//!
//! ```text
//! config/{env}.yaml → logging → PostgreSQL pool + schema → PgStore → HTTP gateway
//! ```

use std::sync::Arc;

use anyhow::Context;
use bank_ledger::config::AppConfig;
use bank_ledger::db::Database;
use bank_ledger::gateway::{self, state::AppState};
use bank_ledger::ledger::PgStore;
use bank_ledger::logging::init_logging;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = init_logging(&config);
    tracing::info!(env = %env, "Starting bank_ledger");

    let db = Database::connect(config.postgres_url()?, config.ledger.max_connections)
        .await
        .context("connect to PostgreSQL")?;
    db.init_schema().await.context("initialize schema")?;

    let store = Arc::new(PgStore::new(db.pool().clone()));
    let state = AppState::new(store, &config.ledger);

    gateway::run_server(&config.gateway, state)
        .await
        .context("gateway server")?;
    tracing::info!("Shutdown complete");
    Ok(())
}
