//! In-memory persistence for zones, sensors, the barrier and the event log
//!
//! Plays the role of the backing database: it owns the uniqueness invariant
//! on sensor uids, the barrier singleton, and the append-only event vector.
//! All access goes through one `parking_lot::RwLock`, which is plenty for
//! the low write volume this service sees.

use crate::domain::types::{
    AccessEvent, Barrier, BarrierState, Sensor, SensorId, SensorStatus, Zone, ZoneId,
};
use crate::infra::config::Config;
use anyhow::{bail, Context};
use chrono::Utc;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::info;

/// Fixed id of the barrier singleton
pub const BARRIER_ID: i64 = 1;

struct StoreInner {
    zones: FxHashMap<i64, Zone>,
    sensors: FxHashMap<i64, Sensor>,
    /// uid -> sensor id, upholds the unique-uid invariant
    uid_index: FxHashMap<String, i64>,
    barrier: Barrier,
    /// Append-only; never mutated or truncated
    events: Vec<AccessEvent>,
    next_zone_id: i64,
    next_sensor_id: i64,
}

pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store. The barrier singleton starts CERRADA.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                zones: FxHashMap::default(),
                sensors: FxHashMap::default(),
                uid_index: FxHashMap::default(),
                barrier: Barrier {
                    id: BARRIER_ID,
                    state: BarrierState::Closed,
                    updated_at: Utc::now(),
                },
                events: Vec::new(),
                next_zone_id: 1,
                next_sensor_id: 1,
            }),
        }
    }

    /// Load seed zones and sensors declared in the config file.
    /// Seed sensors reference zones by name; unknown names are an error.
    pub fn seed(&self, config: &Config) -> anyhow::Result<()> {
        for seed in config.seed_zones() {
            self.insert_zone(&seed.name, &seed.description, seed.active);
        }

        for seed in config.seed_sensors() {
            let status: SensorStatus = seed
                .estado
                .parse()
                .ok()
                .with_context(|| format!("seed sensor {}: unknown estado {}", seed.uid, seed.estado))?;

            let zone = self
                .zone_by_name(&seed.zone)
                .with_context(|| format!("seed sensor {}: unknown zone {}", seed.uid, seed.zone))?;

            if self
                .insert_sensor(&seed.uid, &seed.alias, status, zone.id, seed.user.clone())
                .is_none()
            {
                bail!("seed sensor {}: duplicate uid", seed.uid);
            }
        }

        let inner = self.inner.read();
        info!(
            zones = inner.zones.len(),
            sensors = inner.sensors.len(),
            "store_seeded"
        );
        Ok(())
    }

    // ----- Zones -----

    pub fn zones(&self) -> Vec<Zone> {
        let inner = self.inner.read();
        let mut zones: Vec<Zone> = inner.zones.values().cloned().collect();
        zones.sort_by_key(|z| z.id.0);
        zones
    }

    pub fn zone(&self, id: ZoneId) -> Option<Zone> {
        self.inner.read().zones.get(&id.0).cloned()
    }

    pub fn zone_by_name(&self, name: &str) -> Option<Zone> {
        self.inner.read().zones.values().find(|z| z.name == name).cloned()
    }

    pub fn insert_zone(&self, name: &str, description: &str, active: bool) -> Zone {
        let mut inner = self.inner.write();
        let id = ZoneId(inner.next_zone_id);
        inner.next_zone_id += 1;

        let zone = Zone {
            id,
            name: name.to_string(),
            description: description.to_string(),
            active,
        };
        inner.zones.insert(id.0, zone.clone());
        zone
    }

    /// Replace an existing zone. Returns None if the id is unknown.
    pub fn put_zone(&self, zone: Zone) -> Option<Zone> {
        let mut inner = self.inner.write();
        if !inner.zones.contains_key(&zone.id.0) {
            return None;
        }
        inner.zones.insert(zone.id.0, zone.clone());
        Some(zone)
    }

    /// Whether any sensor still references the zone
    pub fn zone_in_use(&self, id: ZoneId) -> bool {
        self.inner.read().sensors.values().any(|s| s.zone == id)
    }

    pub fn delete_zone(&self, id: ZoneId) -> bool {
        self.inner.write().zones.remove(&id.0).is_some()
    }

    // ----- Sensors -----

    pub fn sensors(&self) -> Vec<Sensor> {
        let inner = self.inner.read();
        let mut sensors: Vec<Sensor> = inner.sensors.values().cloned().collect();
        sensors.sort_by_key(|s| s.id.0);
        sensors
    }

    pub fn sensor(&self, id: SensorId) -> Option<Sensor> {
        self.inner.read().sensors.get(&id.0).cloned()
    }

    /// Exact-match lookup by credential uid
    pub fn sensor_by_uid(&self, uid: &str) -> Option<Sensor> {
        let inner = self.inner.read();
        let id = inner.uid_index.get(uid)?;
        inner.sensors.get(id).cloned()
    }

    /// Insert a sensor. Returns None when the uid is already registered.
    pub fn insert_sensor(
        &self,
        uid: &str,
        alias: &str,
        status: SensorStatus,
        zone: ZoneId,
        user: Option<String>,
    ) -> Option<Sensor> {
        let mut inner = self.inner.write();
        if inner.uid_index.contains_key(uid) {
            return None;
        }

        let id = SensorId(inner.next_sensor_id);
        inner.next_sensor_id += 1;

        let now = Utc::now();
        let sensor = Sensor {
            id,
            uid: uid.to_string(),
            alias: alias.to_string(),
            status,
            zone,
            user,
            created_at: now,
            updated_at: now,
        };
        inner.uid_index.insert(uid.to_string(), id.0);
        inner.sensors.insert(id.0, sensor.clone());
        Some(sensor)
    }

    /// Replace an existing sensor, re-checking uid uniqueness when it
    /// changed. `updated_at` is stamped here. Returns None when the id is
    /// unknown or the new uid collides with another sensor.
    pub fn put_sensor(&self, mut sensor: Sensor) -> Option<Sensor> {
        let mut inner = self.inner.write();
        let old_uid = inner.sensors.get(&sensor.id.0)?.uid.clone();

        if sensor.uid != old_uid {
            if inner.uid_index.contains_key(&sensor.uid) {
                return None;
            }
            inner.uid_index.remove(&old_uid);
            inner.uid_index.insert(sensor.uid.clone(), sensor.id.0);
        }

        sensor.updated_at = Utc::now();
        inner.sensors.insert(sensor.id.0, sensor.clone());
        Some(sensor)
    }

    pub fn delete_sensor(&self, id: SensorId) -> bool {
        let mut inner = self.inner.write();
        match inner.sensors.remove(&id.0) {
            Some(sensor) => {
                inner.uid_index.remove(&sensor.uid);
                true
            }
            None => false,
        }
    }

    // ----- Barrier -----

    pub fn barrier(&self) -> Barrier {
        self.inner.read().barrier.clone()
    }

    pub fn set_barrier(&self, state: BarrierState) -> Barrier {
        let mut inner = self.inner.write();
        inner.barrier.state = state;
        inner.barrier.updated_at = Utc::now();
        inner.barrier.clone()
    }

    // ----- Events -----

    pub fn append_event(&self, event: AccessEvent) {
        self.inner.write().events.push(event);
    }

    /// All events in append (timestamp) order
    pub fn events(&self) -> Vec<AccessEvent> {
        self.inner.read().events.clone()
    }

    pub fn event(&self, id: &str) -> Option<AccessEvent> {
        self.inner.read().events.iter().find(|e| e.id == id).cloned()
    }

    pub fn event_count(&self) -> usize {
        self.inner.read().events.len()
    }
}
