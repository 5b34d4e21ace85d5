use std::time::Duration;

use crate::config::DiscoveryConfig;

/// 服务发现客户端配置
#[derive(Debug, Clone)]
pub struct DiscoveryClientConfig {
    /// 注册中心地址
    pub registry_url: String,
    /// 本服务的逻辑名称
    pub service_name: String,
    /// 本服务对外的主机名
    pub host: String,
    /// 本服务对外的端口
    pub port: u16,
    /// 心跳周期，应明显小于注册中心的心跳超时
    pub heartbeat_interval: Duration,
    /// 单次请求超时时间
    pub request_timeout: Duration,
}

impl DiscoveryClientConfig {
    pub fn new(service_name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// 从共享配置的 `[discovery]` 段构建
    pub fn from_config(
        config: &DiscoveryConfig,
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            registry_url: config.registry_url.clone(),
            service_name: service_name.into(),
            host: host.into(),
            port,
            heartbeat_interval: config.heartbeat_interval(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn health_check_url(&self) -> String {
        format!("http://{}:{}/health", self.host, self.port)
    }
}

impl Default for DiscoveryClientConfig {
    fn default() -> Self {
        Self {
            registry_url: "http://localhost:3010".to_string(),
            service_name: String::new(),
            host: "localhost".to_string(),
            port: 3000,
            heartbeat_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
        }
    }
}
