//! Layered configuration for the issue bridge.
//!
//! Values are resolved in this order, later sources winning:
//! built-in defaults → `bridge.toml` → `BRIDGE_*` environment variables → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8010
//!
//! [database]
//! path = ".bridge/bridge.db"
//!
//! [tracker]
//! create_url = "http://10.0.0.10:8000/issue/"
//! jira_url = "http://10.0.0.4:8080"
//! issue_type = "10004"
//! assignee = "xplat-support"
//!
//! [reconcile]
//! interval_secs = 30
//!
//! [issue_defaults]
//! tenant_id = "00001-HN"
//! region_id = "HA NOI"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "bridge.toml";

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8010
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".bridge/bridge.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where and how tickets are pushed to the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerSection {
    /// Ticket-creation endpoint (accepts query parameters, returns `{"id": ..}`).
    #[serde(default = "default_create_url")]
    pub create_url: String,
    /// Base URL of the Jira REST API used for status lookups.
    #[serde(default = "default_jira_url")]
    pub jira_url: String,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    #[serde(default = "default_assignee")]
    pub assignee: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_create_url() -> String {
    "http://10.0.0.10:8000/issue/".to_string()
}

fn default_jira_url() -> String {
    "http://10.0.0.4:8080".to_string()
}

fn default_issue_type() -> String {
    "10004".to_string()
}

fn default_assignee() -> String {
    "xplat-support".to_string()
}

fn default_environment() -> String {
    "environment".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            create_url: default_create_url(),
            jira_url: default_jira_url(),
            issue_type: default_issue_type(),
            assignee: default_assignee(),
            environment: default_environment(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TrackerSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconcileSection {
    /// Seconds between two status comparisons for one issue.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl ReconcileSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Values stamped onto new issues when neither the request nor the
/// error catalog provides them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueDefaults {
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    #[serde(default = "default_vpc_id")]
    pub vpc_id: String,
    #[serde(default = "default_region_id")]
    pub region_id: String,
    #[serde(default = "default_issue_name")]
    pub name: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_tenant_id() -> String {
    "00001-HN".to_string()
}

fn default_vpc_id() -> String {
    "12fg5fj4".to_string()
}

fn default_region_id() -> String {
    "HA NOI".to_string()
}

fn default_issue_name() -> String {
    "K8s Error Network Internal".to_string()
}

fn default_service() -> String {
    "K8S".to_string()
}

fn default_status() -> String {
    "TO DO".to_string()
}

impl Default for IssueDefaults {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant_id(),
            vpc_id: default_vpc_id(),
            region_id: default_region_id(),
            name: default_issue_name(),
            service: default_service(),
            status: default_status(),
        }
    }
}

/// Names recorded on automatically written step-log entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepLogSection {
    #[serde(default = "default_step_actor")]
    pub reporter_name: String,
    #[serde(default = "default_step_actor")]
    pub supporter_name: String,
}

fn default_step_actor() -> String {
    "xplat".to_string()
}

impl Default for StepLogSection {
    fn default() -> Self {
        Self {
            reporter_name: default_step_actor(),
            supporter_name: default_step_actor(),
        }
    }
}

/// The complete bridge.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub reconcile: ReconcileSection,
    #[serde(default)]
    pub issue_defaults: IssueDefaults,
    #[serde(default)]
    pub step_log: StepLogSection,
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse bridge.toml")
    }

    /// Load from `path` when given, otherwise from `bridge.toml` in the working
    /// directory if present, then apply environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `BRIDGE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BRIDGE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("BRIDGE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid BRIDGE_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("BRIDGE_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(url) = lookup("BRIDGE_TRACKER_URL") {
            self.tracker.create_url = url;
        }
        if let Some(url) = lookup("BRIDGE_JIRA_URL") {
            self.tracker.jira_url = url;
        }
        if let Some(secs) = lookup("BRIDGE_RECONCILE_INTERVAL_SECS") {
            self.reconcile.interval_secs = secs
                .parse()
                .with_context(|| format!("Invalid BRIDGE_RECONCILE_INTERVAL_SECS '{}'", secs))?;
        }
        Ok(())
    }

    /// Listen address in `host:port` form.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.reconcile.interval_secs == 0 {
            warnings.push(
                "reconcile.interval_secs is 0; jobs will poll the tracker without pause"
                    .to_string(),
            );
        }
        if self.tracker.timeout_secs == 0 {
            warnings.push(
                "tracker.timeout_secs is 0; every tracker call will time out".to_string(),
            );
        }
        for (key, url) in [
            ("tracker.create_url", &self.tracker.create_url),
            ("tracker.jira_url", &self.tracker.jira_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                warnings.push(format!("{} '{}' is not an http(s) URL", key, url));
            }
        }

        warnings
    }
}
