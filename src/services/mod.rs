pub mod api;
pub mod client;
pub mod lifecycle;
pub mod registry;

pub use registry::{RegistryStore, ServiceHealthStatus, ServiceInstance, ServiceRegistry};
