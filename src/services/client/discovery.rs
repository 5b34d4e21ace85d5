use std::sync::Arc;

use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

use super::config::DiscoveryClientConfig;
use super::error::DiscoveryClientError;
use crate::services::api::{HeartbeatResponse, RegisterRequest};
use crate::services::registry::{RegistryStats, ServiceInstance};

// 本实例在注册中心的登记状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Registration {
    #[default]
    Pending,
    Active(String),
    // 主动注销后不再由心跳任务重新注册
    Left,
}

impl Registration {
    fn id(&self) -> Option<&str> {
        match self {
            Registration::Active(id) => Some(id),
            Registration::Pending | Registration::Left => None,
        }
    }
}

/// 嵌入在各个服务中的服务发现客户端
///
/// 启动时注册一次并保存返回的 ID，之后按固定周期发送心跳；
/// 解析依赖时按名称查询并取第一个候选实例。
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    config: DiscoveryClientConfig,
    base_url: Url,
    http: reqwest::Client,
    // 注册、注销与心跳中的重新注册在持锁期间完成请求，互不交错
    registration: Arc<Mutex<Registration>>,
}

impl DiscoveryClient {
    /// 创建新的服务发现客户端
    pub fn new(config: DiscoveryClientConfig) -> Result<Self, DiscoveryClientError> {
        let base_url = Url::parse(&config.registry_url)
            .map_err(|e| DiscoveryClientError::InvalidRegistryUrl(format!("{}: {e}", config.registry_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(DiscoveryClientError::InvalidRegistryUrl(config.registry_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            base_url,
            http,
            registration: Arc::new(Mutex::new(Registration::Pending)),
        })
    }

    pub fn config(&self) -> &DiscoveryClientConfig {
        &self.config
    }

    pub async fn instance_id(&self) -> Option<String> {
        self.registration.lock().await.id().map(str::to_string)
    }

    /// 是否已主动注销
    pub async fn has_left(&self) -> bool {
        *self.registration.lock().await == Registration::Left
    }

    // 拼接注册中心路径，各段会被正确转义
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// 注册本服务实例，返回注册中心生成的 ID
    pub async fn register(&self) -> Result<String, DiscoveryClientError> {
        let mut registration = self.registration.lock().await;
        self.register_locked(&mut registration).await
    }

    async fn register_locked(
        &self,
        registration: &mut Registration,
    ) -> Result<String, DiscoveryClientError> {
        let request = RegisterRequest::new(
            self.config.service_name.clone(),
            self.config.host.clone(),
            self.config.port,
            self.config.health_check_url(),
        );

        let response = self
            .http
            .post(self.endpoint(&["api", "services"]))
            .json(&request)
            .send()
            .await?;
        let instance: ServiceInstance = Self::expect_success(response).await?.json().await?;

        tracing::info!(
            service_id = %instance.id,
            service_name = %instance.name,
            registry_url = %self.base_url,
            "Service registered successfully"
        );

        *registration = Registration::Active(instance.id.clone());
        Ok(instance.id)
    }

    /// 发送一次心跳；实例已被注册中心移除时返回 `Ok(false)`
    pub async fn heartbeat(&self) -> Result<bool, DiscoveryClientError> {
        let id = self
            .instance_id()
            .await
            .ok_or(DiscoveryClientError::NotRegistered)?;
        self.heartbeat_for(&id).await
    }

    async fn heartbeat_for(&self, id: &str) -> Result<bool, DiscoveryClientError> {
        let response = self
            .http
            .put(self.endpoint(&["api", "services", id, "heartbeat"]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let ack: HeartbeatResponse = Self::expect_success(response).await?.json().await?;
        tracing::debug!(service_id = %id, timestamp = %ack.timestamp, "Heartbeat sent");
        Ok(true)
    }

    /// 注销本服务实例
    ///
    /// 请求成功或注册中心返回 404 后才清除 ID，失败时保留以便重试。
    /// 注销后心跳任务不会再重新注册，只有显式调用 `register` 才会重新加入。
    pub async fn unregister(&self) -> Result<bool, DiscoveryClientError> {
        let mut registration = self.registration.lock().await;
        let id = registration
            .id()
            .map(str::to_string)
            .ok_or(DiscoveryClientError::NotRegistered)?;

        let response = self
            .http
            .delete(self.endpoint(&["api", "services", id.as_str()]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            *registration = Registration::Left;
            tracing::warn!(service_id = %id, "Service was already removed from registry");
            return Ok(false);
        }

        Self::expect_success(response).await?;
        *registration = Registration::Left;
        tracing::info!(service_id = %id, "Service unregistered");
        Ok(true)
    }

    /// 按名称查询实例
    pub async fn find_service(
        &self,
        name: &str,
        healthy_only: bool,
    ) -> Result<Vec<ServiceInstance>, DiscoveryClientError> {
        let url = self.endpoint(&["api", "services", "name", name]);
        tracing::debug!(service_name = %name, url = %url, "Finding service");

        let response = self
            .http
            .get(url)
            .query(&[("healthy", healthy_only)])
            .send()
            .await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    /// 解析依赖：取第一个健康实例，没有候选时返回错误
    pub async fn resolve(&self, name: &str) -> Result<ServiceInstance, DiscoveryClientError> {
        self.find_service(name, true)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryClientError::NoCandidates(name.to_string()))
    }

    pub async fn resolve_address(&self, name: &str) -> Result<String, DiscoveryClientError> {
        Ok(self.resolve(name).await?.address())
    }

    pub async fn stats(&self) -> Result<RegistryStats, DiscoveryClientError> {
        let response = self.http.get(self.endpoint(&["api", "stats"])).send().await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    /// 启动周期心跳任务
    pub fn start_heartbeat(&self) -> HeartbeatHandle {
        let handle = HeartbeatHandle {
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        };

        let client = self.clone();
        let shutdown = handle.shutdown.clone();
        let period = self.config.heartbeat_interval;

        handle.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => client.heartbeat_tick().await,
                }
            }

            tracing::debug!(service_name = %client.config.service_name, "Heartbeat task stopped");
        });
        handle.task_tracker.close();

        handle
    }

    // 失败只记录日志，等待下一个周期，不立即重试
    async fn heartbeat_tick(&self) {
        let Some(id) = self.instance_id().await else {
            tracing::debug!(
                service_name = %self.config.service_name,
                "Service instance is not registered, skipping heartbeat"
            );
            return;
        };

        match self.heartbeat_for(&id).await {
            Ok(true) => {}
            Ok(false) => self.reregister_evicted(&id).await,
            Err(e) => {
                tracing::warn!(
                    service_name = %self.config.service_name,
                    error = %e,
                    "Error sending heartbeat"
                );
            }
        }
    }

    // 仅当仍持有被移除的那个 ID 时才重新注册，期间发生的注销优先
    async fn reregister_evicted(&self, evicted_id: &str) {
        let mut registration = self.registration.lock().await;
        if registration.id() != Some(evicted_id) {
            return;
        }

        tracing::warn!(
            service_id = %evicted_id,
            service_name = %self.config.service_name,
            "Service instance was evicted by the registry, re-registering"
        );
        if let Err(e) = self.register_locked(&mut registration).await {
            tracing::warn!(error = %e, "Error re-registering service");
        }
    }

    async fn expect_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DiscoveryClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(DiscoveryClientError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        })
    }
}

/// 心跳任务句柄，`stop` 取消并等待任务退出
#[derive(Debug)]
pub struct HeartbeatHandle {
    task_tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl HeartbeatHandle {
    pub fn is_running(&self) -> bool {
        !self.task_tracker.is_empty()
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.task_tracker.wait().await;
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
