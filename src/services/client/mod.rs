pub mod config;
pub mod discovery;
pub mod error;

pub use config::DiscoveryClientConfig;
pub use discovery::{DiscoveryClient, HeartbeatHandle};
pub use error::DiscoveryClientError;
