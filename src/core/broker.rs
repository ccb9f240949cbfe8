use crate::core::db;
use crate::core::error;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Serialized access layer for the inspection database.
///
/// Instance mutation is single-writer-per-instance; in-process we serialize
/// all writes through one lock and append an audit event per operation to
/// `inspection.events.jsonl`.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join("inspection.events.jsonl"),
        }
    }

    /// Execute a closure with a serialized connection to the inspection DB.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, error::QcError>
    where
        F: FnOnce(&Connection) -> Result<R, error::QcError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap();

        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, op_name, &db_id, status)?;

        result
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), error::QcError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let event = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };
        let line = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
