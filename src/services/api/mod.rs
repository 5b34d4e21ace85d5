//! HTTP boundary of the registry
//!
//! - `registration`: register / heartbeat / unregister with payload validation
//! - `query`: list / by-name / by-id / stats
//! - `routes`: axum router wiring both onto the JSON surface
//! - `error`: boundary error taxonomy and its HTTP mapping

pub mod error;
pub mod query;
pub mod registration;
pub mod routes;
pub mod types;

pub use error::RegistryApiError;
pub use query::QueryApi;
pub use registration::RegistrationApi;
pub use routes::{AppState, create_router, with_middleware};
pub use types::{
    ErrorResponse, FieldViolation, HealthResponse, HeartbeatResponse, MessageResponse,
    RegisterRequest,
};
