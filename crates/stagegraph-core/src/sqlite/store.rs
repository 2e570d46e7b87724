use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{
    CoreError, CoreErrorKind, ExecutionStatus, OperationContext, StageExecution, StageExecutionId,
    StageFailure, TaskExecution,
};
use crate::persistence::{ExecutionStore, MigrationStore, PersistenceResult};
use crate::sqlite::migrations::{SqliteMigration, current_schema_version, migration, migrations};

const MIGRATIONS_TABLE: &str = "stagegraph_schema_migrations";

const SELECT_EXECUTION_COLUMNS: &str = "
SELECT execution_id, stage_type, status, tasks_json, context_json, failure_json,
       created_at_unix_ms, finished_at_unix_ms
FROM stage_executions
";

pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn planned_migrations(&self, from_version: i64) -> Vec<&'static SqliteMigration> {
        migrations()
            .iter()
            .filter(|entry| entry.version > from_version)
            .collect()
    }

    pub fn migrate_to_latest(&self) -> PersistenceResult<()> {
        self.apply_migration(current_schema_version())
    }

    /// Removes terminal executions created before `cutoff`.
    pub fn prune_finished(&self, cutoff: SystemTime) -> PersistenceResult<usize> {
        self.with_connection("prune_finished", |connection| {
            require_schema(connection)?;
            let deleted = connection.execute(
                "
DELETE FROM stage_executions
WHERE status IN ('succeeded', 'failed')
  AND created_at_unix_ms < ?1
",
                params![to_unix_millis(cutoff)?],
            )?;
            Ok(deleted)
        })
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| store_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| store_error(operation_name, error))
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_version_table(connection)?;
            schema_version(connection)
        })
    }

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()> {
        let latest = current_schema_version();
        let target_known = target_version == 0 || migration(target_version).is_some();
        if !(0..=latest).contains(&target_version) || !target_known {
            return Err(store_failure(
                "apply_migration",
                format!(
                    "cannot migrate to schema version '{target_version}' (latest is {latest})"
                ),
            ));
        }

        self.with_connection("apply_migration", |connection| {
            ensure_version_table(connection)?;
            let from_version = schema_version(connection)?;
            for (step, direction) in migration_path(from_version, target_version) {
                apply_step(connection, known_migration(step)?, direction)?;
            }
            Ok(())
        })
    }
}

impl ExecutionStore for SqliteStore {
    fn save_execution(&self, execution: &StageExecution) -> PersistenceResult<()> {
        self.with_connection("save_execution", |connection| {
            require_schema(connection)?;
            let failure_json = execution.failure.as_ref().map(to_json).transpose()?;
            connection.execute(
                "
INSERT INTO stage_executions (
    execution_id, stage_type, status, tasks_json, context_json, failure_json,
    failed_task, failure_kind, created_at_unix_ms, finished_at_unix_ms
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(execution_id) DO UPDATE SET
    stage_type = excluded.stage_type,
    status = excluded.status,
    tasks_json = excluded.tasks_json,
    context_json = excluded.context_json,
    failure_json = excluded.failure_json,
    failed_task = excluded.failed_task,
    failure_kind = excluded.failure_kind,
    created_at_unix_ms = excluded.created_at_unix_ms,
    finished_at_unix_ms = excluded.finished_at_unix_ms
",
                params![
                    execution_id_to_i64(execution.id)?,
                    execution.stage_type,
                    execution.status.as_str(),
                    to_json(&execution.tasks)?,
                    to_json(&execution.context)?,
                    failure_json,
                    execution
                        .failure
                        .as_ref()
                        .and_then(|failure| failure.task.as_deref()),
                    execution
                        .failure
                        .as_ref()
                        .map(|failure| failure.kind.as_str()),
                    to_unix_millis(execution.created_at)?,
                    execution.finished_at.map(to_unix_millis).transpose()?,
                ],
            )?;
            Ok(())
        })
    }

    fn load_execution(&self, id: StageExecutionId) -> PersistenceResult<Option<StageExecution>> {
        self.with_connection("load_execution", |connection| {
            require_schema(connection)?;
            connection
                .query_row(
                    &format!("{SELECT_EXECUTION_COLUMNS} WHERE execution_id = ?1"),
                    params![execution_id_to_i64(id)?],
                    read_execution_row,
                )
                .optional()
        })
    }

    fn list_recent(&self, limit: usize) -> PersistenceResult<Vec<StageExecution>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_connection("list_recent", |connection| {
            require_schema(connection)?;
            let mut statement = connection.prepare(&format!(
                "{SELECT_EXECUTION_COLUMNS} ORDER BY created_at_unix_ms DESC, execution_id DESC LIMIT ?1"
            ))?;
            let rows = statement.query_map(params![to_i64(limit)?], read_execution_row)?;
            rows.collect()
        })
    }

    fn next_execution_id(&self) -> PersistenceResult<u64> {
        self.with_connection("next_execution_id", |connection| {
            require_schema(connection)?;
            let max_id: Option<i64> = connection.query_row(
                "SELECT MAX(execution_id) FROM stage_executions",
                [],
                |row| row.get(0),
            )?;
            match max_id {
                Some(id) => Ok(i64_to_u64(id)?.saturating_add(1)),
                None => Ok(0),
            }
        })
    }
}

fn read_execution_row(row: &Row<'_>) -> rusqlite::Result<StageExecution> {
    let id_raw: i64 = row.get(0)?;
    let stage_type: String = row.get(1)?;
    let status_raw: String = row.get(2)?;
    let tasks_json: String = row.get(3)?;
    let context_json: String = row.get(4)?;
    let failure_json: Option<String> = row.get(5)?;
    let created_at_ms: i64 = row.get(6)?;
    let finished_at_ms: Option<i64> = row.get(7)?;

    let tasks: Vec<TaskExecution> = from_json(&tasks_json)?;
    let context: OperationContext = from_json(&context_json)?;
    let failure: Option<StageFailure> = failure_json.as_deref().map(from_json).transpose()?;

    Ok(StageExecution {
        id: StageExecutionId(i64_to_u64(id_raw)?),
        stage_type,
        status: parse_execution_status(&status_raw)?,
        tasks,
        context,
        failure,
        created_at: from_unix_millis(created_at_ms)?,
        finished_at: finished_at_ms.map(from_unix_millis).transpose()?,
    })
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    let parent = database_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|error| sqlite_error(&error.to_string()))?;
    }
    Connection::open(database_path)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Direction {
    Up,
    Down,
}

/// Versions to apply, in order, to move the schema from `from` to `to`.
fn migration_path(from: i64, to: i64) -> Vec<(i64, Direction)> {
    if to >= from {
        ((from + 1)..=to).map(|step| (step, Direction::Up)).collect()
    } else {
        ((to + 1)..=from).rev().map(|step| (step, Direction::Down)).collect()
    }
}

fn ensure_version_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "
CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_unix_ms INTEGER NOT NULL
);
"
    ))
}

fn require_schema(connection: &Connection) -> rusqlite::Result<()> {
    ensure_version_table(connection)?;
    if schema_version(connection)? == 0 {
        return Err(sqlite_error(
            "stage execution schema is not initialized; run migrations first",
        ));
    }
    Ok(())
}

fn schema_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT IFNULL(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn known_migration(version: i64) -> rusqlite::Result<&'static SqliteMigration> {
    migration(version)
        .ok_or_else(|| sqlite_error(&format!("no migration is defined for version {version}")))
}

fn apply_step(
    connection: &mut Connection,
    step: &SqliteMigration,
    direction: Direction,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    match direction {
        Direction::Up => {
            transaction.execute_batch(step.up_sql)?;
            transaction.execute(
                &format!(
                    "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix_ms) \
                     VALUES (?1, ?2, ?3)"
                ),
                params![step.version, step.name, to_unix_millis(SystemTime::now())?],
            )?;
        }
        Direction::Down => {
            transaction.execute_batch(step.down_sql)?;
            transaction.execute(
                &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE version = ?1"),
                params![step.version],
            )?;
        }
    }
    tracing::debug!(
        version = step.version,
        name = step.name,
        direction = ?direction,
        "applied sqlite migration"
    );
    transaction.commit()
}

fn parse_execution_status(raw: &str) -> rusqlite::Result<ExecutionStatus> {
    raw.parse::<ExecutionStatus>().map_err(|_| {
        sqlite_error(&format!(
            "unknown execution status '{raw}' found in persisted sqlite record"
        ))
    })
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value)
        .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|error| {
        sqlite_error(&format!("malformed json in persisted sqlite record: {error}"))
    })
}

fn to_unix_millis(value: SystemTime) -> rusqlite::Result<i64> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        sqlite_error(&format!("time before unix epoch is not supported: {error}"))
    })?;
    i64::try_from(duration.as_millis())
        .map_err(|_| sqlite_error("unix timestamp millis exceed i64 range"))
}

fn from_unix_millis(value: i64) -> rusqlite::Result<SystemTime> {
    let millis = u64::try_from(value)
        .map_err(|_| sqlite_error("negative unix timestamps are not supported"))?;
    Ok(UNIX_EPOCH + Duration::from_millis(millis))
}

fn execution_id_to_i64(value: StageExecutionId) -> rusqlite::Result<i64> {
    i64::try_from(value.0).map_err(|_| sqlite_error("execution id exceeds i64 range"))
}

fn i64_to_u64(value: i64) -> rusqlite::Result<u64> {
    u64::try_from(value)
        .map_err(|_| sqlite_error("negative execution id in sqlite record"))
}

fn to_i64(value: usize) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| sqlite_error("value exceeds i64 range"))
}

fn store_error(operation: &str, error: rusqlite::Error) -> CoreError {
    store_failure(operation, error.to_string())
}

fn store_failure(operation: &str, message: impl Into<String>) -> CoreError {
    CoreError::new(
        CoreErrorKind::StorageFailure,
        format!("execution store {operation} failed: {}", message.into()),
    )
}

fn sqlite_error(message: &str) -> rusqlite::Error {
    let error = std::io::Error::other(message.to_string());
    rusqlite::Error::ToSqlConversionFailure(Box::new(error))
}
