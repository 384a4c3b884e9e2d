//! Services - business logic and state management
//!
//! - `evaluator` - Access-admission decision for scanned credentials
//! - `registry` - Sensor and zone CRUD with write-time rules
//! - `barrier` - Manual barrier override
//! - `event_log` - Append-only access-event log

pub mod barrier;
pub mod evaluator;
pub mod event_log;
pub mod registry;

// Re-export commonly used types
pub use barrier::BarrierService;
pub use evaluator::AccessEvaluator;
pub use event_log::EventLog;
pub use registry::{Registry, SensorPatch, ZonePatch};
