//! Configuration loader.
//!
//! Reads `relay.toml` (or the path given on the command line) into
//! [`RelayConfig`], then applies environment overrides. Falls back to
//! defaults when the file is missing or malformed.

use std::path::Path;

use secrecy::SecretString;

use relay_types::config::RelayConfig;

/// Overrides `[database] url`.
pub const ENV_DATABASE_URL: &str = "RELAY_DATABASE_URL";
/// Overrides `[providers] local_base_url`.
pub const ENV_LOCAL_URL: &str = "RELAY_LOCAL_URL";
/// Cloud provider API key. Never read from the config file.
pub const ENV_CLOUD_API_KEY: &str = "OPENAI_API_KEY";

/// Configuration plus the secrets that only come from the environment.
///
/// Does not derive Debug so the API key cannot end up in logs.
pub struct RuntimeConfig {
    pub config: RelayConfig,
    pub cloud_api_key: Option<SecretString>,
}

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(path: &Path) -> RelayConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            RelayConfig::default()
        }
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(
    config: &mut RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.trim().is_empty()) {
        config.database.url = url;
    }
    if let Some(url) = lookup(ENV_LOCAL_URL).filter(|v| !v.trim().is_empty()) {
        config.providers.local_base_url = url;
    }
}

/// Read the cloud API key; blank values count as unset.
pub fn cloud_api_key(lookup: impl Fn(&str) -> Option<String>) -> Option<SecretString> {
    lookup(ENV_CLOUD_API_KEY)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

/// Load the file, apply process environment overrides and collect secrets.
pub async fn load_runtime_config(path: &Path) -> RuntimeConfig {
    let mut config = load_config(path).await;
    let env = |name: &str| std::env::var(name).ok();
    apply_env_overrides(&mut config, env);
    RuntimeConfig {
        config,
        cloud_api_key: cloud_api_key(env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("relay.toml")).await;
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.relay.channel_capacity, 100);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("relay.toml");
        tokio::fs::write(
            &path,
            r#"
[server]
host = "0.0.0.0"
port = 9001

[database]
url = "sqlite:///var/lib/relay/relay.db"

[relay]
max_tokens = 2048
"#,
        )
        .await
        .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.database.url, "sqlite:///var/lib/relay/relay.db");
        assert_eq!(config.relay.max_tokens, 2048);
        assert_eq!(config.relay.channel_capacity, 100);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("relay.toml");
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = RelayConfig::default();
        apply_env_overrides(
            &mut config,
            env_of(&[
                (ENV_DATABASE_URL, "sqlite://other.db"),
                (ENV_LOCAL_URL, "http://gpu-box:11434"),
            ]),
        );
        assert_eq!(config.database.url, "sqlite://other.db");
        assert_eq!(config.providers.local_base_url, "http://gpu-box:11434");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = RelayConfig::default();
        apply_env_overrides(&mut config, env_of(&[(ENV_DATABASE_URL, "  ")]));
        assert_eq!(config.database.url, "sqlite://relay.db");
    }

    #[test]
    fn cloud_api_key_from_env() {
        assert!(cloud_api_key(env_of(&[])).is_none());
        assert!(cloud_api_key(env_of(&[(ENV_CLOUD_API_KEY, "")])).is_none());
        let key = cloud_api_key(env_of(&[(ENV_CLOUD_API_KEY, " sk-live ")])).unwrap();
        assert_eq!(key.expose_secret(), "sk-live");
    }
}
