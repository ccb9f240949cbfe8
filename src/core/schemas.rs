//! Database schema definitions for the inspection store.
//!
//! One SQLite database holds master data (phases, templates) and inspection
//! runs. Instance rows keep the full serialized run in a JSON `body` column
//! next to the scalar columns used for filtering, plus a `version` column for
//! optimistic writes.

pub const INSPECTION_DB_NAME: &str = "inspections.db";

pub const INSPECTION_DB_SCHEMA_PHASES: &str = "
    CREATE TABLE IF NOT EXISTS phases (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        ord INTEGER NOT NULL
    )
";

pub const INSPECTION_DB_SCHEMA_TEMPLATES: &str = "
    CREATE TABLE IF NOT EXISTS templates (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        body TEXT NOT NULL -- JSON: ChecklistTemplate
    )
";

pub const INSPECTION_DB_SCHEMA_INSTANCES: &str = "
    CREATE TABLE IF NOT EXISTS instances (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL,
        phase_id TEXT NOT NULL,
        template_id TEXT NOT NULL,
        status TEXT NOT NULL,
        score REAL NOT NULL,
        created_at INTEGER NOT NULL,
        submitted_at INTEGER,
        version INTEGER NOT NULL,
        body TEXT NOT NULL -- JSON: InspectionInstance
    )
";

pub const INSPECTION_DB_SCHEMA_INSTANCES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_instances_project_phase ON instances(project_id, phase_id)";

pub const ALL_SCHEMAS: [&str; 4] = [
    INSPECTION_DB_SCHEMA_PHASES,
    INSPECTION_DB_SCHEMA_TEMPLATES,
    INSPECTION_DB_SCHEMA_INSTANCES,
    INSPECTION_DB_SCHEMA_INSTANCES_INDEX,
];
