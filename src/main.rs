use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use issue_bridge::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "issue-bridge")]
#[command(version, about = "Bridge operational error reports into Jira")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format: text or json
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and reconciliation jobs
    Serve {
        /// Path to bridge.toml (defaults to ./bridge.toml when present)
        #[arg(short, long, env = "BRIDGE_CONFIG")]
        config: Option<PathBuf>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Create the database and its tables, then exit
    InitDb {
        #[arg(short, long, env = "BRIDGE_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Show which tracker project an error code is filed under
    Classify {
        /// Error code, e.g. db_conn_refused
        code: String,
    },
    /// Print the effective configuration and any warnings
    Config {
        #[arg(short, long, env = "BRIDGE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format)?;

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            db_path,
        } => {
            let overrides = cmd::Overrides {
                host,
                port,
                db_path,
            };
            cmd::cmd_serve(config.as_deref(), overrides).await?;
        }
        Commands::InitDb { config, db_path } => {
            let overrides = cmd::Overrides {
                db_path,
                ..Default::default()
            };
            cmd::cmd_init_db(config.as_deref(), overrides)?;
        }
        Commands::Classify { code } => cmd::cmd_classify(&code),
        Commands::Config { config } => cmd::cmd_config(config.as_deref())?,
    }

    Ok(())
}
