use super::error::RegistryApiError;
use crate::services::registry::{
    RegistryStats, ServiceHealthStatus, ServiceInstance, ServiceQuery, ServiceRegistry,
};

/// 按名称、ID、状态解析实例以及获取统计信息的边界操作
#[derive(Debug, Clone)]
pub struct QueryApi {
    registry: ServiceRegistry,
}

impl QueryApi {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    // 空字符串视为未提供；未知状态值直接拒绝
    pub fn list(
        &self,
        name: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<ServiceInstance>, RegistryApiError> {
        let status = status
            .filter(|raw| !raw.is_empty())
            .map(str::parse::<ServiceHealthStatus>)
            .transpose()?;

        let query = ServiceQuery {
            name: name.filter(|raw| !raw.is_empty()).map(str::to_string),
            status,
        };

        Ok(self.registry.query(&query))
    }

    pub fn by_name(&self, name: &str, healthy_only: bool) -> Vec<ServiceInstance> {
        if healthy_only {
            self.registry.get_healthy_by_name(name)
        } else {
            self.registry.get_by_name(name)
        }
    }

    pub fn by_id(&self, id: &str) -> Result<ServiceInstance, RegistryApiError> {
        self.registry
            .get_by_id(id)
            .ok_or_else(|| RegistryApiError::service_not_found(id))
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::{ManualClock, RegistryStore, ServiceRegistration, SweepPolicy};
    use chrono::DateTime;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (QueryApi, ServiceRegistry, ManualClock) {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let registry: ServiceRegistry = Arc::new(RegistryStore::new(Arc::new(clock.clone())));
        (QueryApi::new(registry.clone()), registry, clock)
    }

    fn register(registry: &ServiceRegistry, name: &str) -> ServiceInstance {
        registry.register(ServiceRegistration {
            name: name.to_string(),
            host: "h".to_string(),
            port: 9000,
            health_check_url: "http://h:9000/health".to_string(),
        })
    }

    #[test]
    fn list_rejects_unknown_status() {
        let (api, _registry, _clock) = setup();

        let err = api.list(None, Some("unknown")).unwrap_err();
        assert!(matches!(err, RegistryApiError::InvalidStatus(_)));
        assert!(api.list(None, Some("HEALTHY")).is_err());
    }

    #[test]
    fn list_treats_empty_filters_as_absent() {
        let (api, registry, _clock) = setup();
        register(&registry, "svc-a");
        register(&registry, "svc-b");

        assert_eq!(api.list(Some(""), Some("")).unwrap().len(), 2);
        assert_eq!(api.list(Some("svc-a"), None).unwrap().len(), 1);
        assert_eq!(api.list(Some("svc-a"), Some("unhealthy")).unwrap().len(), 0);
    }

    #[test]
    fn by_name_honours_healthy_flag() {
        let (api, registry, clock) = setup();
        let stale = register(&registry, "svc-a");
        clock.advance(Duration::from_secs(31));
        let fresh = register(&registry, "svc-a");
        registry.sweep(registry.now(), SweepPolicy::default());

        assert_eq!(api.by_name("svc-a", false).len(), 2);
        let healthy = api.by_name("svc-a", true);
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].id, fresh.id);
        assert_ne!(healthy[0].id, stale.id);
    }

    #[test]
    fn by_id_reports_not_found() {
        let (api, registry, _clock) = setup();
        let instance = register(&registry, "svc-a");

        assert_eq!(api.by_id(&instance.id).unwrap(), instance);
        assert!(matches!(api.by_id("missing"), Err(RegistryApiError::NotFound(_))));
        assert_eq!(api.stats().total, 1);
    }
}
