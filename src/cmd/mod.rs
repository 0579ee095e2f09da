//! CLI command implementations.
//!
//! | Module     | Commands handled        |
//! |------------|-------------------------|
//! | `serve`    | `Serve`, `InitDb`       |
//! | `classify` | `Classify`              |
//! | `config`   | `Config`                |

pub mod classify;
pub mod config;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::Result;
use issue_bridge::config::BridgeConfig;

pub use classify::cmd_classify;
pub use config::cmd_config;
pub use serve::{cmd_init_db, cmd_serve};

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
}

pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<BridgeConfig> {
    let mut config = BridgeConfig::resolve(path)?;
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(db_path) = overrides.db_path {
        config.database.path = db_path;
    }
    Ok(config)
}
