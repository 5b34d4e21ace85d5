//! Registry module
//!
//! In-memory service instance registry split into logical components:
//! - `types`: instance records, filters, stats and sweep results
//! - `clock`: injectable time source
//! - `store`: the lock-protected store and its register/heartbeat/sweep primitives

pub mod clock;
pub mod store;
pub mod types;

// Re-export public types for easier access
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::RegistryStore;
pub use types::{
    RegistryStats, ServiceHealthStatus, ServiceInstance, ServiceQuery, ServiceRegistration,
    ServiceRegistry, SweepPolicy, SweepReport, SweptInstance, UnknownStatus,
};
