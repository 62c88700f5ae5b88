use crate::subnet::SubnetDescriptor;
use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Largest range a single scanner accepts (a /16).
pub const MAX_SCAN_HOSTS: u64 = 65_534;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub sinks: SinksConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "default_subnet")]
    pub subnet: String,
    #[serde(default = "default_rpc_port")]
    pub port: u16,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_seconds: u64,
    /// Maximum number of in-flight device operations per phase.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub collect_stats: bool,
    /// Look up each device's MAC in the ARP cache (same L2 segment only).
    #[serde(default)]
    pub resolve_mac: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SinksConfig {
    #[serde(default)]
    pub storage: StorageSinkConfig,
    #[serde(default)]
    pub push: PushSinkConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSinkConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_storage_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushSinkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_push_timeout")]
    pub timeout_seconds: u64,
    /// Wrap each record as `{"results": [record]}` before posting.
    #[serde(default = "default_true")]
    pub wrap_results: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_subnet() -> String {
    "192.168.0.*".to_string()
}

fn default_rpc_port() -> u16 {
    4028
}

fn default_scan_interval() -> u64 {
    30
}

fn default_concurrency() -> usize {
    64
}

fn default_probe_timeout_ms() -> u64 {
    1500
}

fn default_rpc_timeout_ms() -> u64 {
    5000
}

fn default_max_response_bytes() -> usize {
    1024 * 1024
}

fn default_storage_path() -> String {
    "data/telemetry.jsonl".to_string()
}

fn default_push_timeout() -> u64 {
    10
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9101
}

fn default_true() -> bool {
    true
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
            port: default_rpc_port(),
            scan_interval_seconds: default_scan_interval(),
            concurrency: default_concurrency(),
            probe_timeout_ms: default_probe_timeout_ms(),
            collect_stats: true,
            resolve_mac: false,
        }
    }
}

impl ScannerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_rpc_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StorageSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_storage_path(),
        }
    }
}

impl Default for PushSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            api_key: None,
            timeout_seconds: default_push_timeout(),
            wrap_results: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ASIC_SCANNER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Startup checks. Anything rejected here would otherwise fail every
    /// cycle, so it is fatal before the loop starts.
    pub fn validate(&self) -> Result<SubnetDescriptor> {
        let subnet = self
            .scanner
            .subnet
            .parse::<SubnetDescriptor>()
            .with_context(|| format!("Invalid scanner.subnet '{}'", self.scanner.subnet))?;

        if subnet.host_count() > MAX_SCAN_HOSTS {
            bail!(
                "scanner.subnet {} covers {} hosts, more than the {} a scan may cover",
                subnet,
                subnet.host_count(),
                MAX_SCAN_HOSTS
            );
        }
        if self.scanner.scan_interval_seconds == 0 {
            bail!("scanner.scan_interval_seconds must be greater than zero");
        }
        if self.scanner.concurrency == 0 {
            bail!("scanner.concurrency must be greater than zero");
        }
        if self.rpc.max_response_bytes == 0 {
            bail!("rpc.max_response_bytes must be greater than zero");
        }
        if self.sinks.push.enabled && self.sinks.push.url.as_deref().unwrap_or("").is_empty() {
            bail!("sinks.push.enabled is set but sinks.push.url is missing");
        }

        Ok(subnet)
    }
}
