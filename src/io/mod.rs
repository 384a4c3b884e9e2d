//! IO modules - external interfaces
//!
//! - `api` - JSON/HTTP API (hyper)
//! - `auth` - Token authentication and role guards
//! - `audit` - Access-event audit trail to file (JSONL format)

pub mod api;
pub mod audit;
pub mod auth;

// Re-export commonly used types
pub use api::{start_api_server, ApiContext};
pub use audit::AuditLog;
pub use auth::Authenticator;
