use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::services::lifecycle::LifecycleConfig;
use crate::services::registry::SweepPolicy;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "REGISTRY_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to read environment overrides: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub discovery: DiscoveryConfig,
}

// 监听地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3010,
        }
    }
}

// 心跳超时与清理周期
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub heartbeat_timeout_secs: u64,
    /// 未设置时取两倍心跳超时
    pub removal_threshold_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 30,
            removal_threshold_secs: None,
            sweep_interval_secs: 60,
        }
    }
}

impl RegistryConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn removal_threshold(&self) -> Duration {
        Duration::from_secs(
            self.removal_threshold_secs
                .unwrap_or(self.heartbeat_timeout_secs.saturating_mul(2)),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            sweep_interval: self.sweep_interval(),
            policy: SweepPolicy {
                heartbeat_timeout: self.heartbeat_timeout(),
                removal_threshold: self.removal_threshold(),
            },
        }
    }
}

// 服务发现客户端侧的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub registry_url: String,
    pub heartbeat_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            registry_url: "http://localhost:3010".to_string(),
            heartbeat_interval_secs: 15,
            request_timeout_secs: 10,
        }
    }
}

impl DiscoveryConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `REGISTRY_*` 环境变量覆盖项
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvOverrides {
    pub config: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub heartbeat_timeout_secs: Option<u64>,
    pub removal_threshold_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub url: Option<String>,
    pub client_heartbeat_interval_secs: Option<u64>,
    pub client_request_timeout_secs: Option<u64>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed(ENV_PREFIX).from_env()?)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter(vars)?)
    }
}

impl Config {
    // 默认值 -> 配置文件 -> 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }

        let overrides = EnvOverrides::from_env()?;
        let path = overrides
            .config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            tracing::info!(path = %path, "Loading configuration file");
            Self::from_file(&path)?
        } else {
            tracing::info!(path = %path, "Configuration file not found, using defaults");
            Self::default()
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(secs) = overrides.heartbeat_timeout_secs {
            self.registry.heartbeat_timeout_secs = secs;
        }
        if let Some(secs) = overrides.removal_threshold_secs {
            self.registry.removal_threshold_secs = Some(secs);
        }
        if let Some(secs) = overrides.sweep_interval_secs {
            self.registry.sweep_interval_secs = secs;
        }
        if let Some(url) = overrides.url {
            self.discovery.registry_url = url;
        }
        if let Some(secs) = overrides.client_heartbeat_interval_secs {
            self.discovery.heartbeat_interval_secs = secs;
        }
        if let Some(secs) = overrides.client_request_timeout_secs {
            self.discovery.request_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let registry = &self.registry;
        let discovery = &self.discovery;

        if registry.heartbeat_timeout_secs == 0 {
            return Err(ConfigError::Invalid("heartbeat_timeout_secs must be positive".into()));
        }
        if registry.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep_interval_secs must be positive".into()));
        }
        if registry.removal_threshold() < registry.heartbeat_timeout() {
            return Err(ConfigError::Invalid(format!(
                "removal_threshold_secs ({}) must not be shorter than heartbeat_timeout_secs ({})",
                registry.removal_threshold().as_secs(),
                registry.heartbeat_timeout_secs
            )));
        }
        if discovery.heartbeat_interval_secs == 0 || discovery.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "discovery heartbeat_interval_secs and request_timeout_secs must be positive".into(),
            ));
        }
        if discovery.heartbeat_interval() >= registry.heartbeat_timeout() {
            return Err(ConfigError::Invalid(format!(
                "discovery heartbeat_interval_secs ({}) must be shorter than heartbeat_timeout_secs ({})",
                discovery.heartbeat_interval_secs, registry.heartbeat_timeout_secs
            )));
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_reference_timings() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let lifecycle = config.registry.lifecycle();
        assert_eq!(lifecycle.sweep_interval, Duration::from_secs(60));
        assert_eq!(lifecycle.policy.heartbeat_timeout, Duration::from_secs(30));
        assert_eq!(lifecycle.policy.removal_threshold, Duration::from_secs(60));
        assert_eq!(config.discovery.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(config.listen_addr(), "0.0.0.0:3010");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 8500

            [registry]
            heartbeat_timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8500);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.registry.removal_threshold(), Duration::from_secs(20));
        assert_eq!(config.registry.sweep_interval_secs, 60);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = Config::from_toml_str("[server]\nport = 8500\n").unwrap();
        let overrides = EnvOverrides::from_vars(vars(&[
            ("REGISTRY_PORT", "9100"),
            ("REGISTRY_HEARTBEAT_TIMEOUT_SECS", "45"),
            ("REGISTRY_REMOVAL_THRESHOLD_SECS", "120"),
            ("REGISTRY_URL", "http://registry:9100"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();

        config.apply(overrides);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.registry.heartbeat_timeout_secs, 45);
        assert_eq!(config.registry.removal_threshold(), Duration::from_secs(120));
        assert_eq!(config.discovery.registry_url, "http://registry:9100");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_env_value_is_reported() {
        let result = EnvOverrides::from_vars(vars(&[("REGISTRY_PORT", "not-a-port")]));
        assert!(matches!(result, Err(ConfigError::Env(_))));
    }

    #[test]
    fn validation_rejects_inconsistent_timings() {
        let mut config = Config::default();
        config.discovery.heartbeat_interval_secs = 30;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.registry.removal_threshold_secs = Some(10);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.registry.sweep_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = Config::from_toml_str("[server]\nport = \"high\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
