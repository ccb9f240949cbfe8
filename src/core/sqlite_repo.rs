//! SQLite-backed repositories and template catalog.
//!
//! Rows carry the serialized model in a JSON `body` column; the scalar columns
//! mirror the fields used by filters and by the optimistic version guard.
//! Mutations route through the broker (serialized connection + audit event);
//! reads open their own connection.

use crate::core::broker::DbBroker;
use crate::core::catalog::TemplateCatalog;
use crate::core::db;
use crate::core::error::QcError;
use crate::core::model::{ChecklistTemplate, InspectionInstance, Phase};
use crate::core::repo::{InstanceRepository, PhaseRepository};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

pub struct SqliteStore {
    db_path: PathBuf,
    broker: DbBroker,
}

impl SqliteStore {
    /// Opens (and initializes if needed) the inspection store under `root`.
    pub fn open(root: &Path) -> Result<Self, QcError> {
        db::initialize_inspection_db(root)?;
        Ok(Self {
            db_path: db::inspection_db_path(root),
            broker: DbBroker::new(root),
        })
    }

    fn read_conn(&self) -> Result<Connection, QcError> {
        db::db_connect(&self.db_path.to_string_lossy())
    }

    pub fn upsert_phase(&self, phase: &Phase, actor: &str) -> Result<(), QcError> {
        self.broker
            .with_conn(&self.db_path, actor, "phase.upsert", |conn| {
                conn.execute(
                    "INSERT INTO phases(id, name, ord) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET name = ?2, ord = ?3",
                    params![phase.id, phase.name, phase.order],
                )?;
                Ok(())
            })
    }

    /// Publishes a template. Published templates are immutable: re-publishing
    /// an existing id fails validation instead of silently editing it.
    pub fn publish_template(
        &self,
        template: &ChecklistTemplate,
        actor: &str,
    ) -> Result<(), QcError> {
        template.validate()?;
        let body = serde_json::to_string(template)?;
        self.broker
            .with_conn(&self.db_path, actor, "template.publish", |conn| {
                let exists: Option<String> = conn
                    .query_row(
                        "SELECT id FROM templates WHERE id = ?1",
                        params![template.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    return Err(QcError::Validation(format!(
                        "template {} is already published",
                        template.id
                    )));
                }
                conn.execute(
                    "INSERT INTO templates(id, name, body) VALUES (?1, ?2, ?3)",
                    params![template.id, template.name, body],
                )?;
                Ok(())
            })
    }

    fn instances_where(
        &self,
        clause: &str,
        bind: &[&dyn rusqlite::types::ToSql],
    ) -> Result<Vec<InspectionInstance>, QcError> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT body FROM instances WHERE {} ORDER BY created_at, id",
            clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bind, |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for body in rows {
            let instance: InspectionInstance = serde_json::from_str(&body?)?;
            out.push(instance);
        }
        Ok(out)
    }
}

impl PhaseRepository for SqliteStore {
    fn get_phase(&self, phase_id: &str) -> Result<Phase, QcError> {
        let conn = self.read_conn()?;
        conn.query_row(
            "SELECT id, name, ord FROM phases WHERE id = ?1",
            params![phase_id],
            |row| {
                Ok(Phase {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    order: row.get(2)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| QcError::NotFound(format!("phase {}", phase_id)))
    }

    fn list_phases(&self) -> Result<Vec<Phase>, QcError> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare("SELECT id, name, ord FROM phases ORDER BY ord, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Phase {
                id: row.get(0)?,
                name: row.get(1)?,
                order: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for phase in rows {
            out.push(phase?);
        }
        Ok(out)
    }
}

impl TemplateCatalog for SqliteStore {
    fn get_template(&self, template_id: &str) -> Result<ChecklistTemplate, QcError> {
        let conn = self.read_conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM templates WHERE id = ?1",
                params![template_id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Err(QcError::NotFound(format!("template {}", template_id))),
        }
    }
}

impl InstanceRepository for SqliteStore {
    fn insert(&self, instance: &InspectionInstance, actor: &str) -> Result<(), QcError> {
        let body = serde_json::to_string(instance)?;
        self.broker
            .with_conn(&self.db_path, actor, "instance.insert", |conn| {
                conn.execute(
                    "INSERT INTO instances(id, project_id, phase_id, template_id, status, score, created_at, submitted_at, version, body)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        instance.id,
                        instance.project_id,
                        instance.phase_id,
                        instance.template_id,
                        instance.status.as_str(),
                        instance.score,
                        instance.created_at,
                        instance.submitted_at,
                        instance.version,
                        body
                    ],
                )?;
                Ok(())
            })
    }

    fn get(&self, instance_id: &str) -> Result<InspectionInstance, QcError> {
        let conn = self.read_conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM instances WHERE id = ?1",
                params![instance_id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Err(QcError::NotFound(format!("instance {}", instance_id))),
        }
    }

    fn update(&self, instance: &InspectionInstance, actor: &str) -> Result<u64, QcError> {
        let mut next = instance.clone();
        next.version = instance.version + 1;
        let body = serde_json::to_string(&next)?;
        self.broker
            .with_conn(&self.db_path, actor, "instance.update", |conn| {
                let changed = conn.execute(
                    "UPDATE instances
                     SET status = ?1, score = ?2, submitted_at = ?3, version = ?4, body = ?5
                     WHERE id = ?6 AND version = ?7",
                    params![
                        next.status.as_str(),
                        next.score,
                        next.submitted_at,
                        next.version,
                        body,
                        next.id,
                        instance.version
                    ],
                )?;
                if changed == 1 {
                    return Ok(next.version);
                }
                let current: Option<u64> = conn
                    .query_row(
                        "SELECT version FROM instances WHERE id = ?1",
                        params![next.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match current {
                    Some(version) => Err(QcError::ConcurrencyConflict(format!(
                        "instance {} is at version {}, write was based on {}",
                        next.id, version, instance.version
                    ))),
                    None => Err(QcError::NotFound(format!("instance {}", next.id))),
                }
            })
    }

    fn list_for_project(&self, project_id: &str) -> Result<Vec<InspectionInstance>, QcError> {
        self.instances_where("project_id = ?1", &[&project_id])
    }

    fn list_for_phase(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> Result<Vec<InspectionInstance>, QcError> {
        self.instances_where("project_id = ?1 AND phase_id = ?2", &[&project_id, &phase_id])
    }
}
