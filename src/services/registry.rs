//! Sensor registry and zone directory - CRUD with the write-time rules
//!
//! Rules enforced here (everything else is plain assignment):
//! - sensor uid: trimmed length >= 4, unique across all sensors
//! - sensor zone must exist
//! - a sensor saved as BLOQUEADO must carry a bound user
//! - zone name: trimmed length >= 3
//! - deactivating a zone requires a description

use crate::domain::error::ApiError;
use crate::domain::types::{Sensor, SensorId, SensorStatus, Zone, ZoneId};
use crate::infra::Store;
use std::sync::Arc;
use tracing::info;

/// Partial sensor payload; `None` fields are left untouched on update.
/// `user` is doubly optional: `Some(None)` clears the binding.
#[derive(Debug, Default, Clone)]
pub struct SensorPatch {
    pub uid: Option<String>,
    pub alias: Option<String>,
    pub status: Option<String>,
    pub zone: Option<i64>,
    pub user: Option<Option<String>>,
}

/// Partial zone payload
#[derive(Debug, Default, Clone)]
pub struct ZonePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

pub struct Registry {
    store: Arc<Store>,
}

impl Registry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    // ----- Sensors -----

    pub fn sensors(&self) -> Vec<Sensor> {
        self.store.sensors()
    }

    pub fn sensor(&self, id: SensorId) -> Result<Sensor, ApiError> {
        self.store
            .sensor(id)
            .ok_or_else(|| ApiError::NotFound(format!("sensor {id}")))
    }

    pub fn create_sensor(&self, patch: SensorPatch) -> Result<Sensor, ApiError> {
        let uid = validate_uid(patch.uid.as_deref().unwrap_or_default())?;
        let status = parse_status(patch.status.as_deref().unwrap_or("ACTIVO"))?;
        let zone = self.resolve_zone(patch.zone)?;
        let user = patch.user.unwrap_or(None);
        check_blocked_has_user(status, user.as_ref())?;

        let sensor = self
            .store
            .insert_sensor(&uid, patch.alias.as_deref().unwrap_or_default(), status, zone, user)
            .ok_or_else(|| ApiError::field("uid", "Ya existe un sensor con este UID."))?;

        info!(sensor_id = %sensor.id, uid = %sensor.uid, "sensor_created");
        Ok(sensor)
    }

    pub fn update_sensor(&self, id: SensorId, patch: SensorPatch) -> Result<Sensor, ApiError> {
        let mut sensor = self.sensor(id)?;

        if let Some(uid) = patch.uid {
            sensor.uid = validate_uid(&uid)?;
        }
        if let Some(alias) = patch.alias {
            sensor.alias = alias;
        }
        if let Some(status) = patch.status.as_deref() {
            sensor.status = parse_status(status)?;
        }
        if let Some(zone) = patch.zone {
            sensor.zone = self.resolve_zone(Some(zone))?;
        }
        if let Some(user) = patch.user {
            sensor.user = user;
        }
        check_blocked_has_user(sensor.status, sensor.user.as_ref())?;

        let sensor = self
            .store
            .put_sensor(sensor)
            .ok_or_else(|| ApiError::field("uid", "Ya existe un sensor con este UID."))?;

        info!(sensor_id = %sensor.id, uid = %sensor.uid, "sensor_updated");
        Ok(sensor)
    }

    /// The `cambiar_estado` operation: assign a new status after validating
    /// it is one of the four known values.
    pub fn change_status(&self, id: SensorId, status: &str) -> Result<Sensor, ApiError> {
        self.update_sensor(
            id,
            SensorPatch { status: Some(status.to_string()), ..SensorPatch::default() },
        )
    }

    pub fn delete_sensor(&self, id: SensorId) -> Result<(), ApiError> {
        if !self.store.delete_sensor(id) {
            return Err(ApiError::NotFound(format!("sensor {id}")));
        }
        info!(sensor_id = %id, "sensor_deleted");
        Ok(())
    }

    fn resolve_zone(&self, zone: Option<i64>) -> Result<ZoneId, ApiError> {
        let Some(zone) = zone else {
            return Err(ApiError::field("departamento", "Este campo es requerido."));
        };
        match self.store.zone(ZoneId(zone)) {
            Some(zone) => Ok(zone.id),
            None => Err(ApiError::field("departamento", "Departamento no válido.")),
        }
    }

    // ----- Zones -----

    pub fn zones(&self) -> Vec<Zone> {
        self.store.zones()
    }

    pub fn zone(&self, id: ZoneId) -> Result<Zone, ApiError> {
        self.store
            .zone(id)
            .ok_or_else(|| ApiError::NotFound(format!("zone {id}")))
    }

    pub fn create_zone(&self, patch: ZonePatch) -> Result<Zone, ApiError> {
        let name = validate_zone_name(patch.name.as_deref().unwrap_or_default())?;
        let description = patch.description.unwrap_or_default();
        let active = patch.active.unwrap_or(true);
        check_deactivation_reason(active, &description)?;

        let zone = self.store.insert_zone(&name, &description, active);
        info!(zone_id = %zone.id, name = %zone.name, "zone_created");
        Ok(zone)
    }

    pub fn update_zone(&self, id: ZoneId, patch: ZonePatch) -> Result<Zone, ApiError> {
        let mut zone = self.zone(id)?;

        if let Some(name) = patch.name {
            zone.name = validate_zone_name(&name)?;
        }
        if let Some(description) = patch.description {
            zone.description = description;
        }
        if let Some(active) = patch.active {
            zone.active = active;
        }
        check_deactivation_reason(zone.active, &zone.description)?;

        let zone = self
            .store
            .put_zone(zone)
            .ok_or_else(|| ApiError::NotFound(format!("zone {id}")))?;
        info!(zone_id = %zone.id, "zone_updated");
        Ok(zone)
    }

    pub fn delete_zone(&self, id: ZoneId) -> Result<(), ApiError> {
        self.zone(id)?;
        if self.store.zone_in_use(id) {
            return Err(ApiError::non_field(
                "No se puede eliminar: el departamento tiene sensores asociados.",
            ));
        }
        self.store.delete_zone(id);
        info!(zone_id = %id, "zone_deleted");
        Ok(())
    }
}

fn validate_uid(uid: &str) -> Result<String, ApiError> {
    let uid = uid.trim();
    if uid.len() < 4 {
        return Err(ApiError::field("uid", "El UID debe tener al menos 4 caracteres."));
    }
    Ok(uid.to_string())
}

fn parse_status(status: &str) -> Result<SensorStatus, ApiError> {
    status
        .parse()
        .map_err(|()| ApiError::field("estado", "Estado de sensor no válido."))
}

fn check_blocked_has_user(status: SensorStatus, user: Option<&String>) -> Result<(), ApiError> {
    if status == SensorStatus::Blocked && user.is_none() {
        return Err(ApiError::non_field(
            "Un sensor BLOQUEADO debe estar asociado a un usuario responsable.",
        ));
    }
    Ok(())
}

fn validate_zone_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.len() < 3 {
        return Err(ApiError::field("nombre", "El nombre debe tener mínimo 3 caracteres."));
    }
    Ok(name.to_string())
}

fn check_deactivation_reason(active: bool, description: &str) -> Result<(), ApiError> {
    if !active && description.trim().is_empty() {
        return Err(ApiError::non_field(
            "Si desactivas un departamento, debes agregar una descripción/motivo.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Registry, ZoneId) {
        let store = Arc::new(Store::new());
        let registry = Registry::new(store.clone());
        let zone = store.insert_zone("Bodega", "", true);
        (registry, zone.id)
    }

    fn patch(uid: &str, zone: ZoneId) -> SensorPatch {
        SensorPatch {
            uid: Some(uid.to_string()),
            zone: Some(zone.0),
            ..SensorPatch::default()
        }
    }

    #[test]
    fn test_create_sensor_defaults_to_active() {
        let (registry, zone) = setup();
        let sensor = registry.create_sensor(patch("A1B2C3D4", zone)).unwrap();
        assert_eq!(sensor.status, SensorStatus::Active);
        assert_eq!(sensor.zone, zone);
    }

    #[test]
    fn test_short_uid_rejected() {
        let (registry, zone) = setup();
        let err = registry.create_sensor(patch("  AB ", zone)).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let (registry, zone) = setup();
        registry.create_sensor(patch("A1B2C3D4", zone)).unwrap();
        let err = registry.create_sensor(patch("A1B2C3D4", zone)).unwrap_err();
        match err {
            ApiError::Validation(value) => assert!(value["uid"][0].as_str().unwrap().contains("UID")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_zone_rejected() {
        let (registry, _zone) = setup();
        let err = registry.create_sensor(patch("A1B2C3D4", ZoneId(99))).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let (registry, zone) = setup();
        let mut p = patch("A1B2C3D4", zone);
        p.status = Some("ROTO".to_string());
        let err = registry.create_sensor(p).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_blocked_requires_bound_user() {
        let (registry, zone) = setup();
        let mut p = patch("A1B2C3D4", zone);
        p.status = Some("BLOQUEADO".to_string());
        assert!(registry.create_sensor(p.clone()).is_err());

        p.user = Some(Some("guardia@example.com".to_string()));
        assert!(registry.create_sensor(p).is_ok());
    }

    #[test]
    fn test_change_status() {
        let (registry, zone) = setup();
        let sensor = registry.create_sensor(patch("A1B2C3D4", zone)).unwrap();

        let updated = registry.change_status(sensor.id, "PERDIDO").unwrap();
        assert_eq!(updated.status, SensorStatus::Lost);

        assert!(registry.change_status(sensor.id, "ROTO").is_err());
        assert!(matches!(
            registry.change_status(SensorId(99), "ACTIVO").unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let (registry, zone) = setup();
        let sensor = registry.create_sensor(patch("A1B2C3D4", zone)).unwrap();

        let updated = registry
            .update_sensor(
                sensor.id,
                SensorPatch { alias: Some("portería".to_string()), ..SensorPatch::default() },
            )
            .unwrap();
        assert_eq!(updated.alias, "portería");
        assert_eq!(updated.uid, "A1B2C3D4");
        assert_eq!(updated.status, SensorStatus::Active);
    }

    #[test]
    fn test_zone_name_rule() {
        let (registry, _zone) = setup();
        let err = registry
            .create_zone(ZonePatch { name: Some(" ab ".to_string()), ..ZonePatch::default() })
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_zone_deactivation_requires_description() {
        let (registry, zone) = setup();
        let err = registry
            .update_zone(zone, ZonePatch { active: Some(false), ..ZonePatch::default() })
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let ok = registry
            .update_zone(
                zone,
                ZonePatch {
                    active: Some(false),
                    description: Some("cerrada por obras".to_string()),
                    ..ZonePatch::default()
                },
            )
            .unwrap();
        assert!(!ok.active);
    }

    #[test]
    fn test_zone_delete_protected_while_in_use() {
        let (registry, zone) = setup();
        registry.create_sensor(patch("A1B2C3D4", zone)).unwrap();
        assert!(registry.delete_zone(zone).is_err());

        let sensor = registry.sensors().remove(0);
        registry.delete_sensor(sensor.id).unwrap();
        assert!(registry.delete_zone(zone).is_ok());
    }
}
