//! Event log - append-only record of every admission decision
//!
//! Single choke point for appends: the evaluator and the manual barrier
//! override both log through here, which keeps the one-event-per-decision
//! invariant in one place and mirrors each record to the JSONL audit file.

use crate::domain::types::AccessEvent;
use crate::infra::Store;
use crate::io::audit::AuditLog;
use std::sync::Arc;
use tracing::info;

pub struct EventLog {
    store: Arc<Store>,
    audit: Option<AuditLog>,
}

impl EventLog {
    pub fn new(store: Arc<Store>, audit: Option<AuditLog>) -> Self {
        Self { store, audit }
    }

    /// Append one event to the in-memory log and the audit file
    pub fn append(&self, event: AccessEvent) -> AccessEvent {
        info!(
            event_id = %event.id,
            sensor_uid = event.sensor_uid.as_deref().unwrap_or("-"),
            tipo = %event.kind.as_str(),
            accion = %event.action.as_str(),
            resultado = %event.outcome.as_str(),
            detalle = %event.detail,
            "access_event"
        );

        if let Some(audit) = &self.audit {
            audit.write_event(&event);
        }
        self.store.append_event(event.clone());
        event
    }

    /// All events in append (timestamp) order
    pub fn list(&self) -> Vec<AccessEvent> {
        self.store.events()
    }

    pub fn get(&self, id: &str) -> Option<AccessEvent> {
        self.store.event(id)
    }

    pub fn len(&self) -> usize {
        self.store.event_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AccessAction, EventKind, Outcome};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_append_grows_log_by_one() {
        let log = EventLog::new(Arc::new(Store::new()), None);
        assert!(log.is_empty());

        log.append(AccessEvent::unbound(
            None,
            EventKind::Attempt,
            AccessAction::Attempt,
            Outcome::Denied,
            "UID no registrado en el sistema",
        ));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_append_mirrors_to_audit_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("eventos.jsonl");
        let audit = AuditLog::new(file_path.to_str().unwrap());
        let log = EventLog::new(Arc::new(Store::new()), Some(audit));

        let event = log.append(AccessEvent::unbound(
            Some("admin@example.com".to_string()),
            EventKind::Manual,
            AccessAction::Close,
            Outcome::Allowed,
            "Cierre manual desde API",
        ));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.contains(&event.id));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_get_by_id() {
        let log = EventLog::new(Arc::new(Store::new()), None);
        let event = log.append(AccessEvent::unbound(
            None,
            EventKind::Attempt,
            AccessAction::Attempt,
            Outcome::Denied,
            "x",
        ));

        assert!(log.get(&event.id).is_some());
        assert!(log.get("no-such-id").is_none());
    }
}
