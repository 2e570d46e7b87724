use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use stagegraph_core::models::{
    CoreErrorKind, ExecutionStatus, OperationContext, OperationHandle, StageExecution,
    StageExecutionId, TaskExecution, TaskKind, TaskType,
};
use stagegraph_core::persistence::{ExecutionStore, MigrationStore};
use stagegraph_core::sqlite::{SqliteStore, current_schema_version, migration, migrations};

fn test_db_path(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("stagegraph-{test_name}-{nanos}.sqlite3"))
}

fn at_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

fn running_execution(id: u64, created_ms: u64) -> StageExecution {
    let mut context = OperationContext::new();
    context.insert("serviceKeyName", "orders-key");
    context.insert("cloudProvider", "cloudfoundry");

    StageExecution {
        id: StageExecutionId(id),
        stage_type: "deleteServiceKey".to_string(),
        status: ExecutionStatus::Running,
        tasks: vec![
            TaskExecution {
                name: "deleteServiceKey".to_string(),
                task_type: TaskType::new("cloudfoundry.deleteServiceKey"),
                kind: TaskKind::Action,
                status: ExecutionStatus::Succeeded,
                invocations: 1,
                started_at: Some(at_millis(created_ms)),
                finished_at: Some(at_millis(created_ms + 5)),
            },
            TaskExecution {
                name: "monitorDeleteServiceKey".to_string(),
                task_type: TaskType::new("cloudfoundry.monitorServices"),
                kind: TaskKind::Monitor,
                status: ExecutionStatus::Running,
                invocations: 2,
                started_at: Some(at_millis(created_ms + 5)),
                finished_at: None,
            },
        ],
        context,
        failure: None,
        created_at: at_millis(created_ms),
        finished_at: None,
    }
}

fn migrated_store(test_name: &str) -> (SqliteStore, PathBuf) {
    let path = test_db_path(test_name);
    let store = SqliteStore::new(&path);
    store.migrate_to_latest().unwrap();
    (store, path)
}

#[test]
fn migration_versions_are_strictly_increasing_with_both_directions() {
    let mut previous = 0;
    for entry in migrations() {
        assert!(entry.version > previous);
        assert!(!entry.up_sql.trim().is_empty());
        assert!(!entry.down_sql.trim().is_empty());
        previous = entry.version;
    }

    let latest = current_schema_version();
    assert_eq!(migration(latest).unwrap().version, latest);
}

#[test]
fn migrations_apply_and_roll_back() {
    let path = test_db_path("migrations-roundtrip");
    let store = SqliteStore::new(&path);

    assert_eq!(store.current_version().unwrap(), 0);
    assert_eq!(store.planned_migrations(0).len(), migrations().len());

    store.migrate_to_latest().unwrap();
    assert_eq!(store.current_version().unwrap(), current_schema_version());

    store.apply_migration(0).unwrap();
    assert_eq!(store.current_version().unwrap(), 0);

    store.migrate_to_latest().unwrap();
    assert_eq!(store.current_version().unwrap(), current_schema_version());

    let _ = std::fs::remove_file(path);
}

#[test]
fn undefined_migration_target_fails_with_storage_error() {
    let path = test_db_path("migrations-undefined");
    let store = SqliteStore::new(&path);

    let error = store
        .apply_migration(current_schema_version() + 1)
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::StorageFailure);

    let _ = std::fs::remove_file(path);
}

#[test]
fn execution_operations_require_a_migrated_schema() {
    let path = test_db_path("unmigrated");
    let store = SqliteStore::new(&path);

    let error = store.list_recent(10).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::StorageFailure);
    assert!(error.message.contains("not initialized"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn saved_execution_loads_back_unchanged() {
    let (store, path) = migrated_store("save-load");
    let execution = running_execution(7, 1_700_000_000_000);

    store.save_execution(&execution).unwrap();

    assert_eq!(
        store.load_execution(StageExecutionId(7)).unwrap(),
        Some(execution)
    );
    assert_eq!(store.load_execution(StageExecutionId(8)).unwrap(), None);

    let _ = std::fs::remove_file(path);
}

#[test]
fn saving_again_replaces_the_record_with_failure_details() {
    let (store, path) = migrated_store("upsert");
    let mut execution = running_execution(3, 1_700_000_000_000);
    store.save_execution(&execution).unwrap();

    execution
        .context
        .set_handle(&OperationHandle::new("op-3"));
    execution.context.insert("operation.status", "failed");
    execution.fail(
        Some("monitorDeleteServiceKey".to_string()),
        CoreErrorKind::OperationFailed,
        "service broker rejected the request".to_string(),
    );
    store.save_execution(&execution).unwrap();

    let loaded = store.load_execution(StageExecutionId(3)).unwrap().unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Failed);
    let failure = loaded.failure.unwrap();
    assert_eq!(failure.kind, CoreErrorKind::OperationFailed);
    assert_eq!(failure.last_handle.unwrap().as_str(), "op-3");
    assert_eq!(failure.last_remote_status.as_deref(), Some("failed"));
    assert_eq!(store.list_recent(10).unwrap().len(), 1);

    let _ = std::fs::remove_file(path);
}

#[test]
fn recent_executions_are_newest_first_and_ids_continue() {
    let (store, path) = migrated_store("recent");
    assert_eq!(store.next_execution_id().unwrap(), 0);

    for (id, created) in [(1, 1_000), (2, 3_000), (5, 2_000)] {
        store.save_execution(&running_execution(id, created)).unwrap();
    }

    let ids: Vec<u64> = store
        .list_recent(2)
        .unwrap()
        .into_iter()
        .map(|execution| execution.id.0)
        .collect();
    assert_eq!(ids, vec![2, 5]);
    assert!(store.list_recent(0).unwrap().is_empty());
    assert_eq!(store.next_execution_id().unwrap(), 6);

    let _ = std::fs::remove_file(path);
}

#[test]
fn pruning_removes_only_finished_executions_before_cutoff() {
    let (store, path) = migrated_store("prune");

    let mut finished = running_execution(1, 1_000);
    finished.fail(
        Some("deleteServiceKey".to_string()),
        CoreErrorKind::ActionFailed,
        "service key not found".to_string(),
    );
    store.save_execution(&finished).unwrap();
    store.save_execution(&running_execution(2, 1_000)).unwrap();
    store.save_execution(&running_execution(3, 9_000)).unwrap();

    let deleted = store.prune_finished(at_millis(5_000)).unwrap();
    assert_eq!(deleted, 1);

    let remaining: Vec<u64> = store
        .list_recent(10)
        .unwrap()
        .into_iter()
        .map(|execution| execution.id.0)
        .collect();
    assert_eq!(remaining, vec![3, 2]);

    let _ = std::fs::remove_file(path);
}
