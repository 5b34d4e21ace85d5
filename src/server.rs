use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::services::api::create_router;
use crate::services::lifecycle::{LifecycleConfig, LifecycleMonitor};
use crate::services::registry::{RegistryStore, ServiceRegistry, SystemClock};

pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.listen_addr();

    // 初始化服务注册表
    let registry: ServiceRegistry = Arc::new(RegistryStore::new(Arc::new(SystemClock)));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Service registry listening");

    run(listener, registry, config.registry.lifecycle(), shutdown_signal()).await?;

    Ok(())
}

/// 在给定监听器上提供注册表 HTTP 服务，直到 `shutdown` 完成
///
/// 清理任务随服务启动，服务退出（无论成功与否）后停止。
pub async fn run<F>(
    listener: TcpListener,
    registry: ServiceRegistry,
    lifecycle: LifecycleConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let monitor = LifecycleMonitor::new(registry.clone(), lifecycle);
    monitor.start();

    let app = create_router(registry);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    monitor.stop().await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Service registry stopped with error");
    } else {
        tracing::info!("Service registry stopped");
    }

    result
}

// Ctrl-C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
