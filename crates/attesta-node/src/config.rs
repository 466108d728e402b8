//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use attesta_pipeline::{keys, PublisherConfig, SubscriberConfig};

/// Which side of the pipeline this node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Issues credentials and publishes events.
    Issuer,
    /// Consumes events and serves verification.
    Verifier,
}

impl Default for Role {
    fn default() -> Self {
        Role::Issuer
    }
}

/// Full configuration for an Attesta node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Service role and identity.
    #[serde(default)]
    pub service: ServiceConfig,

    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Event broker settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// Node role (issuer, verifier).
    #[serde(default)]
    pub role: Role,
    /// Worker identifier; defaults to `worker-<pid>` when unset.
    #[serde(default)]
    pub worker_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Pub/sub channel carrying credential events.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Retry scanner period in seconds.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Max due retry entries processed per scan.
    #[serde(default = "default_scan_batch_limit")]
    pub scan_batch_limit: usize,
    /// Upper bound on a single broker command, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Ceiling of the subscriber's in-memory dedup cache.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Newest failed-event envelopes kept for replay.
    #[serde(default = "default_failed_list_cap")]
    pub failed_list_cap: usize,
    /// Newest sync records kept on the timeline.
    #[serde(default = "default_failed_list_cap")]
    pub sync_timeline_cap: usize,
    /// Suggested replay delay recorded on captured failures, in seconds.
    #[serde(default = "default_failed_retry_delay_secs")]
    pub failed_retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    3001
}
fn default_channel() -> String {
    keys::EVENT_CHANNEL.into()
}
fn default_scan_interval_secs() -> u64 {
    5
}
fn default_scan_batch_limit() -> usize {
    10
}
fn default_command_timeout_secs() -> u64 {
    5
}
fn default_dedup_capacity() -> usize {
    10_000
}
fn default_failed_list_cap() -> usize {
    1_000
}
fn default_failed_retry_delay_secs() -> u64 {
    30
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            scan_interval_secs: default_scan_interval_secs(),
            scan_batch_limit: default_scan_batch_limit(),
            command_timeout_secs: default_command_timeout_secs(),
            dedup_capacity: default_dedup_capacity(),
            failed_list_cap: default_failed_list_cap(),
            sync_timeline_cap: default_failed_list_cap(),
            failed_retry_delay_secs: default_failed_retry_delay_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: NodeConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The worker identifier this node stamps on issued credentials.
    pub fn worker_id(&self) -> String {
        self.service
            .worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", std::process::id()))
    }

    /// The API socket address string.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }

    /// Publisher tuning derived from the broker section.
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            channel: self.broker.channel.clone(),
            scan_interval: Duration::from_secs(self.broker.scan_interval_secs),
            scan_batch_limit: self.broker.scan_batch_limit,
            command_timeout: Duration::from_secs(self.broker.command_timeout_secs),
        }
    }

    /// Subscriber tuning derived from the broker section.
    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig {
            channel: self.broker.channel.clone(),
            dedup_capacity: self.broker.dedup_capacity,
            failed_list_cap: self.broker.failed_list_cap,
            sync_timeline_cap: self.broker.sync_timeline_cap,
            failed_retry_delay: Duration::from_secs(self.broker.failed_retry_delay_secs),
            command_timeout: Duration::from_secs(self.broker.command_timeout_secs),
        }
    }
}
