use chrono::{DateTime, Utc};
use url::Url;

use super::error::RegistryApiError;
use super::types::{FieldViolation, RegisterRequest};
use crate::services::registry::{ServiceInstance, ServiceRegistration, ServiceRegistry};

/// 服务实例加入、续约、离开注册表的边界操作
#[derive(Debug, Clone)]
pub struct RegistrationApi {
    registry: ServiceRegistry,
}

impl RegistrationApi {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    // 校验通过后才会写入注册表
    pub fn register(&self, request: RegisterRequest) -> Result<ServiceInstance, RegistryApiError> {
        let registration = validate(request).map_err(RegistryApiError::Validation)?;
        Ok(self.registry.register(registration))
    }

    pub fn heartbeat(&self, id: &str) -> Result<DateTime<Utc>, RegistryApiError> {
        self.registry
            .heartbeat_at(id)
            .ok_or_else(|| RegistryApiError::service_not_found(id))
    }

    pub fn unregister(&self, id: &str) -> Result<(), RegistryApiError> {
        if self.registry.unregister(id) {
            Ok(())
        } else {
            Err(RegistryApiError::service_not_found(id))
        }
    }
}

/// 检查注册请求，一次性返回所有不合法的字段
///
/// `name`/`host` 全为空白视为空；通过校验的值按提交原样保存，不做规范化。
pub fn validate(request: RegisterRequest) -> Result<ServiceRegistration, Vec<FieldViolation>> {
    let mut violations = Vec::new();

    let name = required_text("name", request.name, &mut violations);
    let host = required_text("host", request.host, &mut violations);
    let port = match request.port {
        None | Some(serde_json::Value::Null) => {
            violations.push(FieldViolation::new("port", "is required"));
            None
        }
        Some(value) => match value.as_u64() {
            Some(port) if port > 0 => match u16::try_from(port) {
                Ok(port) => Some(port),
                Err(_) => {
                    violations.push(FieldViolation::new("port", "must not exceed 65535"));
                    None
                }
            },
            _ => {
                violations.push(FieldViolation::new("port", "must be a positive integer"));
                None
            }
        },
    };
    let health_check_url = required_text("healthCheckUrl", request.health_check_url, &mut violations)
        .and_then(|raw| match Url::parse(&raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Some(raw),
            Ok(_) => {
                violations.push(FieldViolation::new(
                    "healthCheckUrl",
                    "must be an absolute http(s) URL",
                ));
                None
            }
            Err(e) => {
                violations.push(FieldViolation::new(
                    "healthCheckUrl",
                    format!("is not a valid URL ({e})"),
                ));
                None
            }
        });

    match (name, host, port, health_check_url) {
        (Some(name), Some(host), Some(port), Some(health_check_url)) if violations.is_empty() => {
            Ok(ServiceRegistration {
                name,
                host,
                port,
                health_check_url,
            })
        }
        _ => Err(violations),
    }
}

fn required_text(
    field: &str,
    value: Option<String>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    // 只检查去掉空白后是否为空，保存时保留原值
    match value {
        Some(value) if !value.trim().is_empty() => Some(value),
        Some(_) => {
            violations.push(FieldViolation::new(field, "must not be empty"));
            None
        }
        None => {
            violations.push(FieldViolation::new(field, "is required"));
            None
        }
    }
}
