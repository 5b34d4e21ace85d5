use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 注册请求体
///
/// 字段都允许缺省，具体约束由 `registration::validate` 统一检查，
/// 这样缺失或类型错误的字段也能得到逐字段的 400 描述。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<serde_json::Value>,
    #[serde(default)]
    pub health_check_url: Option<String>,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        health_check_url: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            host: Some(host.into()),
            port: Some(serde_json::Value::from(port)),
            health_check_url: Some(health_check_url.into()),
        }
    }
}

// 单个字段的校验失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// GET /api/services 查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListServicesParams {
    pub name: Option<String>,
    pub status: Option<String>,
}

// GET /api/services/name/:name 查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ByNameParams {
    #[serde(default)]
    pub healthy: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub overall: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldViolation>>,
}
