//! Shared types for the RFID access gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) event id
pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

/// Newtype wrapper for sensor ids to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SensorId(pub i64);

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for zone ids to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ZoneId(pub i64);

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Administrative status of an RFID sensor.
///
/// Only `Active` sensors are admitted by the evaluator; the other three are
/// all denied the same way and differ only in the logged detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    #[serde(rename = "ACTIVO")]
    Active,
    #[serde(rename = "INACTIVO")]
    Inactive,
    #[serde(rename = "BLOQUEADO")]
    Blocked,
    #[serde(rename = "PERDIDO")]
    Lost,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Active => "ACTIVO",
            SensorStatus::Inactive => "INACTIVO",
            SensorStatus::Blocked => "BLOQUEADO",
            SensorStatus::Lost => "PERDIDO",
        }
    }

    /// Whether a scan from a sensor in this status may be admitted
    #[inline]
    pub fn is_admissible(&self) -> bool {
        matches!(self, SensorStatus::Active)
    }
}

impl std::str::FromStr for SensorStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVO" => Ok(SensorStatus::Active),
            "INACTIVO" => Ok(SensorStatus::Inactive),
            "BLOQUEADO" => Ok(SensorStatus::Blocked),
            "PERDIDO" => Ok(SensorStatus::Lost),
            _ => Err(()),
        }
    }
}

/// Barrier position flag. Optimistic: assumed to reflect reality once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarrierState {
    #[serde(rename = "ABIERTA")]
    Open,
    #[serde(rename = "CERRADA")]
    Closed,
}

impl BarrierState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrierState::Open => "ABIERTA",
            BarrierState::Closed => "CERRADA",
        }
    }
}

/// How an access event was produced: a credential scan or a manual override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "INTENTO")]
    Attempt,
    #[serde(rename = "MANUAL")]
    Manual,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Attempt => "INTENTO",
            EventKind::Manual => "MANUAL",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INTENTO" => Ok(EventKind::Attempt),
            "MANUAL" => Ok(EventKind::Manual),
            _ => Err(()),
        }
    }
}

/// Requested barrier action.
///
/// `Attempt` is the bare-scan action used by the device endpoint: it is
/// evaluated and logged but never drives the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessAction {
    #[serde(rename = "ABRIR")]
    Open,
    #[serde(rename = "CERRAR")]
    Close,
    #[serde(rename = "INTENTO")]
    Attempt,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Open => "ABRIR",
            AccessAction::Close => "CERRAR",
            AccessAction::Attempt => "INTENTO",
        }
    }
}

impl std::str::FromStr for AccessAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ABRIR" => Ok(AccessAction::Open),
            "CERRAR" => Ok(AccessAction::Close),
            "INTENTO" => Ok(AccessAction::Attempt),
            _ => Err(()),
        }
    }
}

/// Admission decision outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "PERMITIDO")]
    Allowed,
    #[serde(rename = "DENEGADO")]
    Denied,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "PERMITIDO",
            Outcome::Denied => "DENEGADO",
        }
    }
}

/// Role of an authenticated API caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "OPERADOR")]
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Operator => "OPERADOR",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "OPERADOR" => Ok(Role::Operator),
            _ => Err(()),
        }
    }
}

/// Authenticated caller resolved from an API token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub role: Role,
}

/// A registered RFID sensor (credential)
#[derive(Debug, Clone)]
pub struct Sensor {
    pub id: SensorId,
    /// Credential uid, unique across all sensors, trimmed length >= 4
    pub uid: String,
    pub alias: String,
    pub status: SensorStatus,
    pub zone: ZoneId,
    /// Email of the user the credential is bound to, if any
    pub user: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A department / zone sensors belong to
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub description: String,
    pub active: bool,
}

/// The physical barrier, represented purely as a status flag.
/// Exactly one instance exists; it is created with the store.
#[derive(Debug, Clone)]
pub struct Barrier {
    pub id: i64,
    pub state: BarrierState,
    pub updated_at: DateTime<Utc>,
}

/// Immutable audit record of one admission decision or manual override.
///
/// The serialized form is the wire/audit schema: sensor uid and user email
/// are denormalized onto the record so it stays readable after registry
/// changes.
#[derive(Debug, Clone, Serialize)]
pub struct AccessEvent {
    pub id: String,
    #[serde(rename = "sensor")]
    pub sensor_id: Option<SensorId>,
    pub sensor_uid: Option<String>,
    #[serde(rename = "usuario_email")]
    pub user_email: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: EventKind,
    #[serde(rename = "accion")]
    pub action: AccessAction,
    #[serde(rename = "resultado")]
    pub outcome: Outcome,
    #[serde(rename = "detalle")]
    pub detail: String,
    #[serde(rename = "fecha_hora")]
    pub at: DateTime<Utc>,
}

impl AccessEvent {
    /// Build an event for a credential scan against a registered sensor
    pub fn for_sensor(
        sensor: &Sensor,
        kind: EventKind,
        action: AccessAction,
        outcome: Outcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: new_event_id(),
            sensor_id: Some(sensor.id),
            sensor_uid: Some(sensor.uid.clone()),
            user_email: sensor.user.clone(),
            kind,
            action,
            outcome,
            detail: detail.into(),
            at: Utc::now(),
        }
    }

    /// Build an event with no sensor reference (unknown uid, manual override)
    pub fn unbound(
        user_email: Option<String>,
        kind: EventKind,
        action: AccessAction,
        outcome: Outcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: new_event_id(),
            sensor_id: None,
            sensor_uid: None,
            user_email,
            kind,
            action,
            outcome,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}
