use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::store::RegistryStore;

// 服务实例记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub health_check_url: String,
    pub status: ServiceHealthStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl ServiceInstance {
    /// 实例的 `host:port` 地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceHealthStatus::Healthy
    }
}

// 健康状态只有两个取值，"unknown" 没有任何写入路径，因此不保留
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealthStatus {
    Healthy,
    Unhealthy,
}

impl ServiceHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceHealthStatus::Healthy => "healthy",
            ServiceHealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for ServiceHealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown service status: {0} (expected \"healthy\" or \"unhealthy\")")]
pub struct UnknownStatus(pub String);

impl FromStr for ServiceHealthStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "healthy" => Ok(ServiceHealthStatus::Healthy),
            "unhealthy" => Ok(ServiceHealthStatus::Unhealthy),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// 已通过边界校验的注册信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub health_check_url: String,
}

/// 查询过滤条件，缺省字段匹配所有实例
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceQuery {
    pub name: Option<String>,
    pub status: Option<ServiceHealthStatus>,
}

impl ServiceQuery {
    pub fn matches(&self, instance: &ServiceInstance) -> bool {
        self.name.as_deref().is_none_or(|name| instance.name == name)
            && self.status.is_none_or(|status| instance.status == status)
    }
}

// 注册表统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub by_name: BTreeMap<String, usize>,
}

// 过期判定参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub heartbeat_timeout: Duration,
    pub removal_threshold: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(30),
            removal_threshold: Duration::from_secs(60),
        }
    }
}

// 一次清理涉及的实例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweptInstance {
    pub id: String,
    pub name: String,
    pub last_heartbeat: DateTime<Utc>,
    pub elapsed: Duration,
}

/// 单次清理的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub marked_unhealthy: Vec<SweptInstance>,
    pub removed: Vec<SweptInstance>,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.marked_unhealthy.is_empty() && self.removed.is_empty()
    }
}

// 由组合根创建并注入各处理器与清理任务的共享注册表
pub type ServiceRegistry = Arc<RegistryStore>;
