use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::types::{
    RegistryStats, ServiceHealthStatus, ServiceInstance, ServiceQuery, ServiceRegistration,
    SweepPolicy, SweepReport, SweptInstance,
};

/// 服务实例的内存注册表
///
/// 整个映射由一把读写锁保护：写操作互斥，读操作看到一致的快照。
/// 所有操作都是同步的、不做 I/O，日志在释放锁之后输出。
#[derive(Debug)]
pub struct RegistryStore {
    instances: RwLock<HashMap<String, ServiceInstance>>,
    clock: Arc<dyn Clock>,
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RegistryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // 每次变更都是单个 map 操作，持锁方 panic 也不会留下半更新的记录
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ServiceInstance>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ServiceInstance>> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }

    // 注册新实例，不做去重
    pub fn register(&self, registration: ServiceRegistration) -> ServiceInstance {
        let instance = {
            let mut instances = self.write();
            let now = self.clock.now();

            let mut id = Uuid::new_v4().to_string();
            while instances.contains_key(&id) {
                id = Uuid::new_v4().to_string();
            }

            let instance = ServiceInstance {
                id: id.clone(),
                name: registration.name,
                host: registration.host,
                port: registration.port,
                health_check_url: registration.health_check_url,
                status: ServiceHealthStatus::Healthy,
                last_heartbeat: now,
                registered_at: now,
            };
            instances.insert(id, instance.clone());
            instance
        };

        tracing::info!(
            service_id = %instance.id,
            service_name = %instance.name,
            address = %instance.address(),
            "Registered service instance"
        );

        instance
    }

    // 心跳：刷新时间戳并恢复为健康
    pub fn heartbeat(&self, id: &str) -> bool {
        self.heartbeat_at(id).is_some()
    }

    /// 与 `heartbeat` 相同，但返回刷新后的心跳时间
    pub fn heartbeat_at(&self, id: &str) -> Option<DateTime<Utc>> {
        let (name, previous, last_heartbeat) = {
            let mut instances = self.write();
            let instance = instances.get_mut(id)?;
            let now = self.clock.now();

            let previous = instance.status;
            // 时钟回拨时保持 last_heartbeat 不减
            instance.last_heartbeat = instance.last_heartbeat.max(now);
            instance.status = ServiceHealthStatus::Healthy;
            (instance.name.clone(), previous, instance.last_heartbeat)
        };

        if previous == ServiceHealthStatus::Unhealthy {
            tracing::info!(
                service_id = %id,
                service_name = %name,
                "Service instance recovered after heartbeat"
            );
        } else {
            tracing::debug!(service_id = %id, service_name = %name, "Heartbeat received");
        }

        Some(last_heartbeat)
    }

    // 注销服务实例
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.write().remove(id);

        match removed {
            Some(instance) => {
                tracing::info!(
                    service_id = %id,
                    service_name = %instance.name,
                    "Unregistered service instance"
                );
                true
            }
            None => false,
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<ServiceInstance> {
        self.read().get(id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Vec<ServiceInstance> {
        self.read()
            .values()
            .filter(|instance| instance.name == name)
            .cloned()
            .collect()
    }

    pub fn get_healthy_by_name(&self, name: &str) -> Vec<ServiceInstance> {
        self.read()
            .values()
            .filter(|instance| instance.name == name && instance.is_healthy())
            .cloned()
            .collect()
    }

    pub fn query(&self, query: &ServiceQuery) -> Vec<ServiceInstance> {
        self.read()
            .values()
            .filter(|instance| query.matches(instance))
            .cloned()
            .collect()
    }

    pub fn get_stats(&self) -> RegistryStats {
        let instances = self.read();
        let mut stats = RegistryStats {
            total: instances.len(),
            ..Default::default()
        };

        for instance in instances.values() {
            match instance.status {
                ServiceHealthStatus::Healthy => stats.healthy += 1,
                ServiceHealthStatus::Unhealthy => stats.unhealthy += 1,
            }
            *stats.by_name.entry(instance.name.clone()).or_default() += 1;
        }

        stats
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// 一次完整的过期扫描，整个过程持有写锁
    ///
    /// 超过 `heartbeat_timeout` 的健康实例降级为不健康；
    /// 超过 `removal_threshold` 的实例无论状态如何都被移除。
    pub fn sweep(&self, now: DateTime<Utc>, policy: SweepPolicy) -> SweepReport {
        let timeout_ms = duration_millis(policy.heartbeat_timeout);
        let removal_ms = duration_millis(policy.removal_threshold);

        let mut instances = self.write();
        let mut report = SweepReport {
            scanned: instances.len(),
            ..Default::default()
        };

        instances.retain(|id, instance| {
            let elapsed_ms = now
                .signed_duration_since(instance.last_heartbeat)
                .num_milliseconds();
            let swept = || SweptInstance {
                id: id.clone(),
                name: instance.name.clone(),
                last_heartbeat: instance.last_heartbeat,
                elapsed: Duration::from_millis(elapsed_ms.max(0).unsigned_abs()),
            };

            if elapsed_ms > removal_ms {
                report.removed.push(swept());
                return false;
            }

            if elapsed_ms > timeout_ms && instance.status == ServiceHealthStatus::Healthy {
                report.marked_unhealthy.push(swept());
                instance.status = ServiceHealthStatus::Unhealthy;
            }

            true
        });

        report
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
