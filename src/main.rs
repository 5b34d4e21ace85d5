use opizontas_discovery::config::Config;
use opizontas_discovery::server;
use tracing_subscriber::EnvFilter;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::load()?;
    tracing::info!(
        heartbeat_timeout_secs = config.registry.heartbeat_timeout_secs,
        removal_threshold_secs = config.registry.removal_threshold().as_secs(),
        sweep_interval_secs = config.registry.sweep_interval_secs,
        "Starting service registry..."
    );

    server::start(config).await?;
    Ok(())
}
