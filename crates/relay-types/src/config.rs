//! Runtime configuration for the relay.
//!
//! `RelayConfig` represents `relay.toml`. Every section and field has a
//! default so an empty or missing file yields a working local setup.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Transcript database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://relay.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Relay engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Capacity of each thread's delta channel. Deltas beyond it are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Token budget passed to every provider request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Seconds to wait for the next upstream delta; `0` waits forever.
    #[serde(default)]
    pub upstream_idle_timeout_secs: u64,
}

fn default_channel_capacity() -> usize {
    100
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_tokens: default_max_tokens(),
            upstream_idle_timeout_secs: 0,
        }
    }
}

/// Upstream provider endpoints and routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_cloud_base_url")]
    pub cloud_base_url: String,
    /// Model name prefixes routed to the cloud provider.
    #[serde(default = "default_cloud_model_prefixes")]
    pub cloud_model_prefixes: Vec<String>,
    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,
}

fn default_cloud_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_cloud_model_prefixes() -> Vec<String> {
    vec!["gpt".to_string()]
}

fn default_local_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            cloud_base_url: default_cloud_base_url(),
            cloud_model_prefixes: default_cloud_model_prefixes(),
            local_base_url: default_local_base_url(),
        }
    }
}
