//! Access evaluator - the admission decision for a scanned credential
//!
//! Given a uid and a requested action, decides PERMITIDO/DENEGADO, drives
//! the barrier on permitted ABRIR/CERRAR, and logs exactly one AccessEvent
//! per call regardless of outcome. Input validation (missing uid, unknown
//! action string) happens at the HTTP layer before this runs, so a call
//! here always produces an event.

use crate::domain::types::{AccessAction, AccessEvent, BarrierState, EventKind, Outcome};
use crate::infra::Store;
use crate::services::event_log::EventLog;
use std::sync::Arc;
use tracing::info;

pub struct AccessEvaluator {
    store: Arc<Store>,
    log: Arc<EventLog>,
}

impl AccessEvaluator {
    pub fn new(store: Arc<Store>, log: Arc<EventLog>) -> Self {
        Self { store, log }
    }

    /// Evaluate one scan.
    ///
    /// - Unknown uid: DENEGADO, no sensor reference.
    /// - Sensor in INACTIVO/BLOQUEADO/PERDIDO: DENEGADO, status in detail.
    /// - Otherwise PERMITIDO; ABRIR/CERRAR move the barrier, INTENTO does
    ///   not.
    ///
    /// The sensor's bound user is copied onto the event. `detail` is only
    /// used for the permitted case; denials carry their own detail.
    pub fn evaluate(
        &self,
        uid: &str,
        action: AccessAction,
        kind: EventKind,
        detail: Option<&str>,
    ) -> AccessEvent {
        let Some(sensor) = self.store.sensor_by_uid(uid) else {
            let event = AccessEvent::unbound(
                None,
                kind,
                action,
                Outcome::Denied,
                "UID no registrado en el sistema",
            );
            return self.log.append(event);
        };

        if !sensor.status.is_admissible() {
            let event = AccessEvent::for_sensor(
                &sensor,
                kind,
                action,
                Outcome::Denied,
                format!("Sensor en estado {}", sensor.status.as_str()),
            );
            return self.log.append(event);
        }

        match action {
            AccessAction::Open => {
                let barrier = self.store.set_barrier(BarrierState::Open);
                info!(uid = %sensor.uid, barrera = %barrier.state.as_str(), "barrier_driven");
            }
            AccessAction::Close => {
                let barrier = self.store.set_barrier(BarrierState::Closed);
                info!(uid = %sensor.uid, barrera = %barrier.state.as_str(), "barrier_driven");
            }
            AccessAction::Attempt => {}
        }

        let event = AccessEvent::for_sensor(
            &sensor,
            kind,
            action,
            Outcome::Allowed,
            detail.unwrap_or_default(),
        );
        self.log.append(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SensorStatus;

    fn setup() -> (Arc<Store>, AccessEvaluator) {
        let store = Arc::new(Store::new());
        let log = Arc::new(EventLog::new(store.clone(), None));
        let evaluator = AccessEvaluator::new(store.clone(), log);
        (store, evaluator)
    }

    fn seed_sensor(store: &Store, uid: &str, status: SensorStatus) {
        let zone = store.insert_zone("Bodega", "", true);
        store.insert_sensor(uid, "", status, zone.id, Some("guardia@example.com".to_string()));
    }

    #[test]
    fn test_unknown_uid_denied_with_null_sensor() {
        let (store, evaluator) = setup();

        let event =
            evaluator.evaluate("ZZZZ0000", AccessAction::Open, EventKind::Attempt, None);

        assert_eq!(event.outcome, Outcome::Denied);
        assert_eq!(event.sensor_id, None);
        assert_eq!(event.detail, "UID no registrado en el sistema");
        // barrier untouched
        assert_eq!(store.barrier().state, BarrierState::Closed);
        assert_eq!(store.event_count(), 1);
    }

    #[test]
    fn test_disallowed_statuses_denied_for_every_action() {
        for status in [SensorStatus::Blocked, SensorStatus::Lost, SensorStatus::Inactive] {
            for action in [AccessAction::Open, AccessAction::Close, AccessAction::Attempt] {
                let (store, evaluator) = setup();
                seed_sensor(&store, "A1B2C3D4", status);

                let event =
                    evaluator.evaluate("A1B2C3D4", action, EventKind::Attempt, None);

                assert_eq!(event.outcome, Outcome::Denied);
                assert_eq!(event.detail, format!("Sensor en estado {}", status.as_str()));
                assert_eq!(store.barrier().state, BarrierState::Closed);
            }
        }
    }

    #[test]
    fn test_active_sensor_open_drives_barrier() {
        let (store, evaluator) = setup();
        seed_sensor(&store, "A1B2C3D4", SensorStatus::Active);

        let event = evaluator.evaluate(
            "A1B2C3D4",
            AccessAction::Open,
            EventKind::Attempt,
            Some("Acceso concedido"),
        );

        assert_eq!(event.outcome, Outcome::Allowed);
        assert_eq!(event.user_email.as_deref(), Some("guardia@example.com"));
        assert_eq!(store.barrier().state, BarrierState::Open);
    }

    #[test]
    fn test_active_sensor_close_drives_barrier() {
        let (store, evaluator) = setup();
        seed_sensor(&store, "A1B2C3D4", SensorStatus::Active);
        store.set_barrier(BarrierState::Open);

        let event =
            evaluator.evaluate("A1B2C3D4", AccessAction::Close, EventKind::Attempt, None);

        assert_eq!(event.outcome, Outcome::Allowed);
        assert_eq!(store.barrier().state, BarrierState::Closed);
    }

    #[test]
    fn test_bare_attempt_never_touches_barrier() {
        let (store, evaluator) = setup();
        seed_sensor(&store, "A1B2C3D4", SensorStatus::Active);

        let event = evaluator.evaluate(
            "A1B2C3D4",
            AccessAction::Attempt,
            EventKind::Attempt,
            Some("Acceso concedido"),
        );

        assert_eq!(event.outcome, Outcome::Allowed);
        assert_eq!(event.detail, "Acceso concedido");
        assert_eq!(store.barrier().state, BarrierState::Closed);
    }

    #[test]
    fn test_every_call_appends_exactly_one_event() {
        let (store, evaluator) = setup();
        seed_sensor(&store, "A1B2C3D4", SensorStatus::Active);

        for (i, uid) in ["A1B2C3D4", "ZZZZ0000", "A1B2C3D4"].iter().enumerate() {
            evaluator.evaluate(uid, AccessAction::Attempt, EventKind::Attempt, None);
            assert_eq!(store.event_count(), i + 1);
        }
    }
}
