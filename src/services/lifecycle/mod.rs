pub mod monitor;

pub use monitor::{LifecycleConfig, LifecycleMonitor};
