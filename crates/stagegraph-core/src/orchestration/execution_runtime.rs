use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, timeout};

use crate::config::{PollPolicy, RuntimeConfig};
use crate::models::{
    CoreError, CoreErrorKind, ExecutionStatus, StageExecution, StageExecutionId, StageSpec,
};
use crate::orchestration::{ActiveStage, OrchestrationResult, StageRunner, StepOutcome};
use crate::persistence::ExecutionStore;
use crate::sqlite::SqliteStore;

/// Runs stage executions concurrently, each on its own tokio task.
///
/// Executions never share a context. The runtime only locks its table of
/// snapshots; task invocations run on the blocking pool.
#[derive(Clone)]
pub struct StageExecutionRuntime {
    runner: StageRunner,
    policy: PollPolicy,
    store: Option<Arc<dyn ExecutionStore>>,
    inner: Arc<Mutex<RuntimeState>>,
}

#[derive(Default)]
struct RuntimeState {
    next_execution_id: u64,
    executions: HashMap<StageExecutionId, StageExecution>,
    completion_notifiers: HashMap<StageExecutionId, Arc<Notify>>,
}

impl StageExecutionRuntime {
    pub fn new(runner: StageRunner, policy: PollPolicy) -> Self {
        Self {
            runner,
            policy,
            store: None,
            inner: Arc::new(Mutex::new(RuntimeState::default())),
        }
    }

    /// Continues execution ids after the highest id already in `store`.
    pub fn with_store(
        runner: StageRunner,
        policy: PollPolicy,
        store: Arc<dyn ExecutionStore>,
    ) -> OrchestrationResult<Self> {
        let next_execution_id = store.next_execution_id()?;
        Ok(Self {
            runner,
            policy,
            store: Some(store),
            inner: Arc::new(Mutex::new(RuntimeState {
                next_execution_id,
                ..RuntimeState::default()
            })),
        })
    }

    /// Uses the configured poll policy. With a `databasePath`, executions are
    /// persisted to a SQLite store migrated to the latest schema first.
    pub fn from_config(runner: StageRunner, config: &RuntimeConfig) -> OrchestrationResult<Self> {
        let Some(database_path) = &config.database_path else {
            return Ok(Self::new(runner, config.poll));
        };

        let store = SqliteStore::new(database_path.clone());
        store.migrate_to_latest()?;
        tracing::info!(
            database_path = %database_path.display(),
            "persisting stage executions to sqlite"
        );
        Self::with_store(runner, config.poll, Arc::new(store))
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Builds and binds the stage, then schedules it. Graph and binding errors
    /// are returned here and no execution is recorded for them.
    pub async fn submit(&self, spec: StageSpec) -> OrchestrationResult<StageExecutionId> {
        let id = {
            let mut state = self.inner.lock().await;
            let id = StageExecutionId(state.next_execution_id);
            state.next_execution_id = state.next_execution_id.saturating_add(1);
            id
        };

        let active = self.runner.start(id, &spec)?;
        let initial = active.execution().clone();

        if let Some(store) = &self.store {
            persist_execution(store.clone(), initial.clone()).await?;
        }

        {
            let mut state = self.inner.lock().await;
            state.executions.insert(id, initial);
            state
                .completion_notifiers
                .insert(id, Arc::new(Notify::new()));
        }

        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.drive(active).await;
        });

        Ok(id)
    }

    pub async fn snapshot(&self, id: StageExecutionId) -> OrchestrationResult<StageExecution> {
        let state = self.inner.lock().await;
        state
            .executions
            .get(&id)
            .cloned()
            .ok_or_else(|| execution_lookup_error(id))
    }

    pub async fn status(&self, id: StageExecutionId) -> OrchestrationResult<ExecutionStatus> {
        Ok(self.snapshot(id).await?.status)
    }

    pub async fn wait_for_terminal(
        &self,
        id: StageExecutionId,
        timeout_duration: Option<Duration>,
    ) -> OrchestrationResult<StageExecution> {
        loop {
            let notify = {
                let state = self.inner.lock().await;
                state
                    .completion_notifiers
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| execution_lookup_error(id))?
            };
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let snapshot = self.snapshot(id).await?;
            if snapshot.is_terminal() {
                return Ok(snapshot);
            }

            match timeout_duration {
                Some(duration) => {
                    timeout(duration, notified).await.map_err(|_| CoreError {
                        stage: Some(snapshot.stage_type.clone()),
                        task: None,
                        kind: CoreErrorKind::Timeout,
                        message: format!(
                            "timed out waiting for stage execution '{}' to complete",
                            id.0
                        ),
                    })?;
                }
                None => notified.await,
            }
        }
    }

    async fn drive(&self, mut active: ActiveStage) {
        let id = active.execution().id;
        let started = Instant::now();
        let interval = self.policy.interval();
        let deadline = self.policy.timeout();

        loop {
            if let Some(limit) = deadline
                && started.elapsed() >= limit
            {
                active.fail_timed_out(started.elapsed());
                self.publish(active.execution().clone()).await;
                break;
            }

            let stepped = tokio::task::spawn_blocking(move || {
                let outcome = active.step();
                (active, outcome)
            })
            .await;

            let outcome = match stepped {
                Ok((returned, outcome)) => {
                    active = returned;
                    self.publish(active.execution().clone()).await;
                    outcome
                }
                Err(join_error) => {
                    self.fail_after_join_error(id, join_error.to_string()).await;
                    break;
                }
            };

            match outcome {
                StepOutcome::Advanced => {}
                StepOutcome::Pending => {
                    let pause = match deadline {
                        Some(limit) => interval.min(limit.saturating_sub(started.elapsed())),
                        None => interval,
                    };
                    tokio::time::sleep(pause).await;
                }
                StepOutcome::Finished(_) => break,
            }
        }

        self.complete(id).await;
    }

    async fn publish(&self, execution: StageExecution) {
        let mut state = self.inner.lock().await;
        state.executions.insert(execution.id, execution);
    }

    async fn fail_after_join_error(&self, id: StageExecutionId, message: String) {
        tracing::error!(
            execution_id = id.0,
            message = %message,
            "stage task invocation aborted"
        );
        let mut state = self.inner.lock().await;
        if let Some(execution) = state.executions.get_mut(&id) {
            let task = execution
                .current_task_index()
                .map(|index| execution.tasks[index].name.clone());
            execution.fail(
                task,
                CoreErrorKind::Internal,
                format!("task invocation join failure: {message}"),
            );
        }
    }

    async fn complete(&self, id: StageExecutionId) {
        let (terminal, notify) = {
            let state = self.inner.lock().await;
            (
                state.executions.get(&id).cloned(),
                state.completion_notifiers.get(&id).cloned(),
            )
        };

        if let (Some(store), Some(execution)) = (&self.store, terminal)
            && let Err(error) = persist_execution(store.clone(), execution).await
        {
            tracing::error!(
                execution_id = id.0,
                kind = error.kind.as_str(),
                message = %error.message,
                "failed to persist terminal stage execution"
            );
        }

        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }
}

async fn persist_execution(
    store: Arc<dyn ExecutionStore>,
    execution: StageExecution,
) -> OrchestrationResult<()> {
    let stage_type = execution.stage_type.clone();
    tokio::task::spawn_blocking(move || store.save_execution(&execution))
        .await
        .map_err(|join_error| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("execution persistence join failure: {join_error}"),
            )
            .with_stage(stage_type.as_str())
        })?
        .map_err(|error| CoreError {
            stage: error.stage.or(Some(stage_type)),
            ..error
        })
}

fn execution_lookup_error(id: StageExecutionId) -> CoreError {
    CoreError::new(
        CoreErrorKind::InvalidInput,
        format!("unknown stage execution id '{}'", id.0),
    )
}
