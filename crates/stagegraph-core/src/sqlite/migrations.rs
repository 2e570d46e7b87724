#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "stage_executions",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS stage_executions (
    execution_id INTEGER PRIMARY KEY,
    stage_type TEXT NOT NULL,
    status TEXT NOT NULL,
    tasks_json TEXT NOT NULL,
    context_json TEXT NOT NULL,
    failure_json TEXT,
    created_at_unix_ms INTEGER NOT NULL,
    finished_at_unix_ms INTEGER
);

CREATE INDEX IF NOT EXISTS idx_stage_executions_created
    ON stage_executions (created_at_unix_ms DESC);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_stage_executions_created;
DROP TABLE IF EXISTS stage_executions;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "stage_execution_failure_columns",
    up_sql: r#"
ALTER TABLE stage_executions ADD COLUMN failed_task TEXT;
ALTER TABLE stage_executions ADD COLUMN failure_kind TEXT;

CREATE INDEX IF NOT EXISTS idx_stage_executions_status
    ON stage_executions (status, stage_type);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_stage_executions_status;
ALTER TABLE stage_executions DROP COLUMN failure_kind;
ALTER TABLE stage_executions DROP COLUMN failed_task;
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
