//! Access-event audit trail - append-only JSONL file
//!
//! Every logged AccessEvent is written as one JSON object per line to the
//! file configured under [audit]. The file is the durable trail; the
//! in-memory event log answers queries.

use crate::domain::types::AccessEvent;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// Audit writer for access events
pub struct AuditLog {
    file_path: String,
}

impl AuditLog {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "audit_log_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write one event to the audit file.
    /// Returns true if successful, false otherwise.
    pub fn write_event(&self, event: &AccessEvent) -> bool {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "audit_serialize_failed");
                return false;
            }
        };

        match self.append_line(&json) {
            Ok(()) => {
                debug!(
                    event_id = %event.id,
                    resultado = %event.outcome.as_str(),
                    "audit_written"
                );
                true
            }
            Err(e) => {
                error!(event_id = %event.id, error = %e, "audit_write_failed");
                false
            }
        }
    }

    /// Append a line to the audit file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AccessAction, EventKind, Outcome};
    use std::fs;
    use tempfile::tempdir;

    fn sample_event(detail: &str) -> AccessEvent {
        AccessEvent::unbound(
            None,
            EventKind::Attempt,
            AccessAction::Attempt,
            Outcome::Denied,
            detail,
        )
    }

    #[test]
    fn test_write_event() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("eventos.jsonl");
        let audit = AuditLog::new(file_path.to_str().unwrap());

        let event = sample_event("UID no registrado en el sistema");
        assert!(audit.write_event(&event));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));

        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["id"], event.id);
        assert_eq!(parsed["resultado"], "DENEGADO");
        assert_eq!(parsed["detalle"], "UID no registrado en el sistema");
    }

    #[test]
    fn test_appends_one_line_per_event() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("eventos.jsonl");
        let audit = AuditLog::new(file_path.to_str().unwrap());

        for i in 0..4 {
            assert!(audit.write_event(&sample_event(&format!("intento {i}"))));
        }

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        for line in lines {
            let _parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("logs").join("auditoria").join("eventos.jsonl");
        let audit = AuditLog::new(nested.to_str().unwrap());

        assert!(audit.write_event(&sample_event("x")));
        assert!(nested.exists());
    }
}
