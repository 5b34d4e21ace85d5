use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use opizontas_discovery::server;
use opizontas_discovery::services::client::{
    DiscoveryClient, DiscoveryClientConfig, DiscoveryClientError,
};
use opizontas_discovery::services::lifecycle::LifecycleConfig;
use opizontas_discovery::services::registry::{
    Clock, ManualClock, RegistryStore, ServiceHealthStatus, ServiceRegistry, SweepPolicy,
};

struct TestRegistry {
    addr: SocketAddr,
    registry: ServiceRegistry,
    clock: ManualClock,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestRegistry {
    async fn start() -> Self {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let registry: ServiceRegistry = Arc::new(RegistryStore::new(Arc::new(clock.clone())));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(server::run(
            listener,
            registry.clone(),
            LifecycleConfig::default(),
            async move {
                let _ = rx.await;
            },
        ));

        Self {
            addr,
            registry,
            clock,
            shutdown: Some(tx),
            handle,
        }
    }

    fn client(&self, name: &str, port: u16) -> DiscoveryClient {
        let config = DiscoveryClientConfig {
            registry_url: format!("http://{}", self.addr),
            heartbeat_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(2),
            ..DiscoveryClientConfig::new(name, "localhost", port)
        };
        DiscoveryClient::new(config).unwrap()
    }

    // 推进时钟并执行一次清理
    fn expire(&self, by: Duration) {
        self.clock.advance(by);
        self.registry.sweep(self.clock.now(), SweepPolicy::default());
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn register_heartbeat_resolve_unregister() {
    let registry = TestRegistry::start().await;
    let client = registry.client("user-service", 3001);

    let id = client.register().await.unwrap();
    assert_eq!(client.instance_id().await.as_deref(), Some(id.as_str()));

    let instance = registry.registry.get_by_id(&id).unwrap();
    assert_eq!(instance.health_check_url, "http://localhost:3001/health");

    registry.clock.advance(Duration::from_secs(20));
    assert!(client.heartbeat().await.unwrap());
    assert_eq!(
        registry.registry.get_by_id(&id).unwrap().last_heartbeat,
        registry.clock.now()
    );

    let consumer = registry.client("order-service", 3002);
    let resolved = consumer.resolve("user-service").await.unwrap();
    assert_eq!(resolved.id, id);
    assert_eq!(consumer.resolve_address("user-service").await.unwrap(), "localhost:3001");

    let stats = consumer.stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.healthy, 1);

    assert!(client.unregister().await.unwrap());
    assert!(client.instance_id().await.is_none());
    assert!(registry.registry.is_empty());

    registry.stop().await;
}

#[tokio::test]
async fn resolve_without_healthy_candidates_fails() {
    let registry = TestRegistry::start().await;
    let provider = registry.client("inventory", 3005);
    let consumer = registry.client("checkout", 3006);

    let result = consumer.resolve("inventory").await;
    assert!(matches!(result, Err(DiscoveryClientError::NoCandidates(name)) if name == "inventory"));

    provider.register().await.unwrap();
    registry.expire(Duration::from_secs(31));

    // 不健康实例仍可查询，但不参与解析
    assert_eq!(consumer.find_service("inventory", false).await.unwrap().len(), 1);
    assert!(consumer.find_service("inventory", true).await.unwrap().is_empty());
    assert!(matches!(
        consumer.resolve("inventory").await,
        Err(DiscoveryClientError::NoCandidates(_))
    ));

    registry.stop().await;
}

#[tokio::test]
async fn heartbeat_before_register_is_an_error() {
    let registry = TestRegistry::start().await;
    let client = registry.client("lonely", 3007);

    assert!(matches!(
        client.heartbeat().await,
        Err(DiscoveryClientError::NotRegistered)
    ));
    assert!(matches!(
        client.unregister().await,
        Err(DiscoveryClientError::NotRegistered)
    ));

    registry.stop().await;
}

#[tokio::test]
async fn heartbeat_after_eviction_reports_unknown() {
    let registry = TestRegistry::start().await;
    let client = registry.client("user-service", 3001);
    client.register().await.unwrap();

    registry.expire(Duration::from_secs(61));
    assert!(registry.registry.is_empty());
    assert!(!client.heartbeat().await.unwrap());

    registry.stop().await;
}

#[tokio::test]
async fn heartbeat_task_keeps_instance_alive_and_reregisters() {
    let registry = TestRegistry::start().await;
    let client = registry.client("user-service", 3001);
    let first_id = client.register().await.unwrap();

    registry.expire(Duration::from_secs(31));
    assert_eq!(
        registry.registry.get_by_id(&first_id).unwrap().status,
        ServiceHealthStatus::Unhealthy
    );

    let heartbeat = client.start_heartbeat();
    assert!(heartbeat.is_running());

    // 心跳使实例恢复健康
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if registry
                .registry
                .get_by_id(&first_id)
                .is_some_and(|instance| instance.is_healthy())
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    // 被移除后下一个心跳周期重新注册
    registry.registry.unregister(&first_id);
    let second_id = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(id) = client.instance_id().await
                && id != first_id
                && registry.registry.get_by_id(&id).is_some()
            {
                break id;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(registry.registry.get_by_name("user-service").len(), 1);
    assert_eq!(registry.registry.get_by_id(&second_id).unwrap().port, 3001);

    heartbeat.stop().await;
    registry.stop().await;
}

#[tokio::test]
async fn unregister_while_heartbeating_stays_unregistered() {
    let registry = TestRegistry::start().await;
    let client = registry.client("user-service", 3001);
    client.register().await.unwrap();

    let heartbeat = client.start_heartbeat();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(client.unregister().await.unwrap());
    assert!(registry.registry.is_empty());

    // 之后的若干心跳周期都不能把实例带回来
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(registry.registry.is_empty());
    assert!(client.instance_id().await.is_none());
    assert!(client.has_left().await);
    assert!(heartbeat.is_running());

    // 显式注册仍然可以重新加入
    let rejoined = client.register().await.unwrap();
    assert!(registry.registry.get_by_id(&rejoined).is_some());
    assert!(!client.has_left().await);

    heartbeat.stop().await;
    registry.stop().await;
}

#[tokio::test]
async fn failed_unregister_keeps_instance_id() {
    let registry = TestRegistry::start().await;
    let client = registry.client("user-service", 3001);
    let id = client.register().await.unwrap();

    // 注册中心已下线，DELETE 无法送达
    registry.stop().await;

    assert!(matches!(
        client.unregister().await,
        Err(DiscoveryClientError::Http(_))
    ));
    assert_eq!(client.instance_id().await.as_deref(), Some(id.as_str()));
    assert!(!client.has_left().await);
}

#[tokio::test]
async fn unregister_after_eviction_still_leaves() {
    let registry = TestRegistry::start().await;
    let client = registry.client("user-service", 3001);
    client.register().await.unwrap();

    registry.expire(Duration::from_secs(61));
    assert!(!client.unregister().await.unwrap());
    assert!(client.instance_id().await.is_none());
    assert!(client.has_left().await);

    registry.stop().await;
}

#[test]
fn invalid_registry_url_is_rejected() {
    let config = DiscoveryClientConfig {
        registry_url: "not a url".to_string(),
        ..DiscoveryClientConfig::new("svc", "localhost", 3000)
    };
    assert!(matches!(
        DiscoveryClient::new(config),
        Err(DiscoveryClientError::InvalidRegistryUrl(_))
    ));
}
