//! Manual barrier override
//!
//! Unconditional state assignment plus a MANUAL / PERMITIDO event
//! attributed to the acting caller. Optimistic: no feedback loop confirms
//! the physical barrier moved.

use crate::domain::types::{AccessAction, AccessEvent, Barrier, BarrierState, Caller, EventKind, Outcome};
use crate::infra::Store;
use crate::services::event_log::EventLog;
use std::sync::Arc;
use tracing::info;

pub struct BarrierService {
    store: Arc<Store>,
    log: Arc<EventLog>,
}

impl BarrierService {
    pub fn new(store: Arc<Store>, log: Arc<EventLog>) -> Self {
        Self { store, log }
    }

    pub fn current(&self) -> Barrier {
        self.store.barrier()
    }

    pub fn open(&self, actor: &Caller) -> Barrier {
        self.set(BarrierState::Open, AccessAction::Open, "Apertura manual desde API", actor)
    }

    pub fn close(&self, actor: &Caller) -> Barrier {
        self.set(BarrierState::Closed, AccessAction::Close, "Cierre manual desde API", actor)
    }

    fn set(
        &self,
        state: BarrierState,
        action: AccessAction,
        detail: &str,
        actor: &Caller,
    ) -> Barrier {
        let barrier = self.store.set_barrier(state);
        info!(
            barrera = %barrier.state.as_str(),
            actor = %actor.email,
            "barrier_manual_override"
        );

        self.log.append(AccessEvent::unbound(
            Some(actor.email.clone()),
            EventKind::Manual,
            action,
            Outcome::Allowed,
            detail,
        ));
        barrier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Role;

    fn setup() -> (Arc<Store>, BarrierService) {
        let store = Arc::new(Store::new());
        let log = Arc::new(EventLog::new(store.clone(), None));
        let service = BarrierService::new(store.clone(), log);
        (store, service)
    }

    fn operator() -> Caller {
        Caller { email: "operador@example.com".to_string(), role: Role::Operator }
    }

    #[test]
    fn test_open_always_succeeds_and_logs_manual_event() {
        let (store, service) = setup();

        let barrier = service.open(&operator());
        assert_eq!(barrier.state, BarrierState::Open);

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Manual);
        assert_eq!(events[0].outcome, Outcome::Allowed);
        assert_eq!(events[0].sensor_id, None);
        assert_eq!(events[0].user_email.as_deref(), Some("operador@example.com"));
        assert_eq!(events[0].detail, "Apertura manual desde API");
    }

    #[test]
    fn test_close_is_unconditional() {
        let (store, service) = setup();

        // already closed; close again still succeeds and logs
        let barrier = service.close(&operator());
        assert_eq!(barrier.state, BarrierState::Closed);
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.events()[0].detail, "Cierre manual desde API");
    }

    #[test]
    fn test_open_then_close_round_trip() {
        let (store, service) = setup();

        service.open(&operator());
        assert_eq!(store.barrier().state, BarrierState::Open);
        service.close(&operator());
        assert_eq!(store.barrier().state, BarrierState::Closed);
        assert_eq!(store.event_count(), 2);
    }
}
