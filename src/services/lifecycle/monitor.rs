use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::services::registry::{ServiceRegistry, SweepPolicy, SweepReport};

// 生命周期监控配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub sweep_interval: Duration,
    pub policy: SweepPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            policy: SweepPolicy::default(),
        }
    }
}

/// 周期性过期扫描任务
///
/// 由组合根创建，`start` 启动后台任务，`stop` 取消并等待其退出。
#[derive(Debug)]
pub struct LifecycleMonitor {
    registry: ServiceRegistry,
    config: LifecycleConfig,
    task_tracker: TaskTracker,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl LifecycleMonitor {
    pub fn new(registry: ServiceRegistry, config: LifecycleConfig) -> Self {
        Self {
            registry,
            config,
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    // 启动清理任务，重复调用或停止后调用返回 false
    pub fn start(&self) -> bool {
        if self.shutdown.is_cancelled() || self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let registry = self.registry.clone();
        let config = self.config;
        let shutdown = self.shutdown.clone();

        tracing::info!(
            sweep_interval_secs = config.sweep_interval.as_secs(),
            heartbeat_timeout_secs = config.policy.heartbeat_timeout.as_secs(),
            removal_threshold_secs = config.policy.removal_threshold.as_secs(),
            "Starting lifecycle monitor"
        );

        self.task_tracker.spawn(async move {
            // 第一次扫描在一个完整周期之后
            let mut interval = tokio::time::interval_at(
                Instant::now() + config.sweep_interval,
                config.sweep_interval,
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        tracing::debug!("Executing service expiration check...");
                        Self::sweep(&registry, config.policy);
                    }
                }
            }

            tracing::info!("Lifecycle monitor stopped");
        });

        true
    }

    /// 立即执行一次扫描
    pub fn run_once(&self) -> SweepReport {
        Self::sweep(&self.registry, self.config.policy)
    }

    // 停止清理任务并等待其退出
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
    }

    fn sweep(registry: &ServiceRegistry, policy: SweepPolicy) -> SweepReport {
        let now = registry.now();
        let report = registry.sweep(now, policy);

        // 锁已释放，再输出日志
        for instance in &report.marked_unhealthy {
            tracing::warn!(
                service_id = %instance.id,
                service_name = %instance.name,
                last_heartbeat = %instance.last_heartbeat.to_rfc3339(),
                elapsed_secs = instance.elapsed.as_secs(),
                timeout_secs = policy.heartbeat_timeout.as_secs(),
                "Service marked as unhealthy due to stale heartbeat"
            );
        }

        for instance in &report.removed {
            tracing::warn!(
                service_id = %instance.id,
                service_name = %instance.name,
                last_heartbeat = %instance.last_heartbeat.to_rfc3339(),
                elapsed_secs = instance.elapsed.as_secs(),
                removal_threshold_secs = policy.removal_threshold.as_secs(),
                "Service removed due to prolonged unhealthiness"
            );
        }

        if report.is_noop() {
            tracing::debug!(scanned = report.scanned, "Cleanup check completed, nothing to do");
        } else {
            tracing::info!(
                scanned = report.scanned,
                marked_unhealthy = report.marked_unhealthy.len(),
                removed = report.removed.len(),
                "Cleanup check completed"
            );
        }

        report
    }
}

impl Drop for LifecycleMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.task_tracker.close();
    }
}
