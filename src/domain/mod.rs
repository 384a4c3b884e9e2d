//! Domain - core business types
//!
//! - `types` - Sensors, barrier, access events and their wire vocabularies
//! - `error` - API error taxonomy

pub mod error;
pub mod types;

pub use error::ApiError;
pub use types::{
    AccessAction, AccessEvent, Barrier, BarrierState, Caller, EventKind, Outcome, Role, Sensor,
    SensorId, SensorStatus, Zone, ZoneId,
};
