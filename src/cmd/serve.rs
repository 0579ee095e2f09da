//! Server and database commands: `issue-bridge serve` and `issue-bridge init-db`.

use std::path::Path;

use anyhow::Result;
use issue_bridge::bridge::{db::BridgeDb, server};

use super::{Overrides, load_config};

pub async fn cmd_serve(config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    server::start_server(config).await
}

pub fn cmd_init_db(config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let db_path = &config.database.path;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    BridgeDb::new(db_path)?;
    println!("Bridge database initialized at {}", db_path.display());
    Ok(())
}
