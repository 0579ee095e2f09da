//! Configuration view command: `issue-bridge config`.

use std::path::Path;

use anyhow::{Context, Result};

use super::{Overrides, load_config};

pub fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, Overrides::default())?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;

    println!("# Effective configuration (file + environment)");
    println!("{}", rendered);

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("# No warnings");
    } else {
        for warning in warnings {
            println!("# warning: {}", warning);
        }
    }
    Ok(())
}
