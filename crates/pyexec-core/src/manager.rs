//! The job state machine.
//!
//! Every submission moves `pending -> running -> {completed | failed |
//! killed}` exactly once. The worker driving a job is its only writer, with
//! one exception: `kill` flips a running record to `killed` from another
//! task. The conflict is settled by making `killed` absorbing - a worker
//! finishing after a kill keeps the killed status and only fills in the
//! output it managed to harvest.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::{ExecutorError, ManagerError};
use crate::executor::ExecutionEngine;
use crate::runtime::ContainerRuntime;
use crate::storage::JobStore;
use crate::traceback;
use crate::types::{Execution, ExecutionRequest, ExecutionStatus, Metadata};

/// Owns execution records and dispatches the engine. Cheap to clone; all
/// state lives behind shared handles.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn JobStore>,
    runtime: Arc<dyn ContainerRuntime>,
    engine: Arc<ExecutionEngine>,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        runtime: Arc<dyn ContainerRuntime>,
        engine: Arc<ExecutionEngine>,
    ) -> Self {
        Self {
            store,
            runtime,
            engine,
        }
    }

    /// Mint an execution id.
    pub fn new_id() -> String {
        format!("exe_{}", Uuid::new_v4())
    }

    /// Run a job on the caller's task and return the terminal record.
    pub async fn submit_sync(
        &self,
        metadata: Metadata,
        tar_bytes: Vec<u8>,
    ) -> Result<Execution, ManagerError> {
        let exec = self.create_record(metadata).await?;
        self.run_to_completion(exec, tar_bytes).await
    }

    /// Create the record and dispatch the job to a background worker whose
    /// lifetime is detached from the calling request. Returns the id
    /// immediately; callers observe progress by polling.
    pub async fn submit_async(
        &self,
        metadata: Metadata,
        tar_bytes: Vec<u8>,
    ) -> Result<String, ManagerError> {
        let exec = self.create_record(metadata).await?;
        let id = exec.id.clone();

        let manager = self.clone();
        tokio::spawn(async move {
            let job_id = exec.id.clone();
            if let Err(e) = manager.run_to_completion(exec, tar_bytes).await {
                log::error!("background job {job_id} failed to record its outcome: {e}");
            }
        });

        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Execution, ManagerError> {
        Ok(self.store.get(id).await?)
    }

    /// Terminate a running job. Anything not currently running is left
    /// untouched and its present status is returned, which also makes
    /// repeated kills harmless.
    pub async fn kill(&self, id: &str) -> Result<String, ManagerError> {
        let mut exec = self.store.get(id).await?;

        if exec.status != ExecutionStatus::Running {
            return Ok(exec.status.to_string());
        }

        // The handle may not be published yet if the sandbox is still being
        // created; marking the record killed is enough, the worker will
        // observe it on its terminal update.
        if !exec.container_handle.is_empty() {
            self.runtime
                .kill(&exec.container_handle)
                .await
                .map_err(ManagerError::Kill)?;
        }

        exec.status = ExecutionStatus::Killed;
        self.store.update(&exec).await?;
        log::info!("job {id} killed on request");

        Ok(ExecutionStatus::Killed.to_string())
    }

    async fn create_record(&self, metadata: Metadata) -> Result<Execution, ManagerError> {
        let exec = Execution::new(Self::new_id(), metadata);
        self.store.create(&exec).await?;
        Ok(exec)
    }

    async fn run_to_completion(
        &self,
        mut exec: Execution,
        tar_bytes: Vec<u8>,
    ) -> Result<Execution, ManagerError> {
        exec.status = ExecutionStatus::Running;
        exec.started_at = Some(Utc::now());
        self.store.update(&exec).await?;

        let request = ExecutionRequest {
            job_id: exec.id.clone(),
            tar_bytes,
            metadata: exec.metadata.clone(),
        };

        let (handle_tx, handle_rx) = oneshot::channel();
        self.spawn_handle_publisher(exec.id.clone(), handle_rx);

        let outcome = self.engine.execute(&request, Some(handle_tx)).await;
        self.record_outcome(&exec.id, outcome).await
    }

    /// Persist the container handle the moment the engine reports it, so a
    /// kill issued mid-flight can reach the sandbox. The store applies the
    /// write only while the record is still running, so this task can never
    /// overwrite a concurrent terminal transition.
    fn spawn_handle_publisher(&self, id: String, handle_rx: oneshot::Receiver<String>) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let Ok(handle) = handle_rx.await else {
                return;
            };
            if let Err(e) = store.set_container_handle(&id, &handle).await {
                log::warn!("job {id}: failed to record container handle: {e}");
            }
        });
    }

    async fn record_outcome(
        &self,
        id: &str,
        outcome: Result<crate::types::ExecutionOutput, ExecutorError>,
    ) -> Result<Execution, ManagerError> {
        // Re-read rather than trusting our copy: a concurrent kill may have
        // flipped the status, and killed is absorbing.
        let mut exec = self.store.get(id).await?;
        let killed = exec.status == ExecutionStatus::Killed;

        let finished = Utc::now();
        exec.finished_at = Some(finished);
        exec.container_handle.clear();

        match outcome {
            Ok(output) => {
                if !killed {
                    exec.status = ExecutionStatus::Completed;
                }
                exec.stdout = output.stdout;
                exec.stderr = output.stderr;
                exec.exit_code = output.exit_code;
                exec.duration_ms = output.duration_ms;
                if exec.exit_code != 0 && !exec.stderr.is_empty() {
                    let (error_type, error_line) = traceback::parse_stderr(&exec.stderr);
                    exec.error_type = error_type;
                    exec.error_line = error_line;
                }
            }
            Err(e) => {
                if !killed {
                    exec.status = ExecutionStatus::Failed;
                }
                exec.error = e.to_string();
                if let Some(started) = exec.started_at {
                    exec.duration_ms = (finished - started).num_milliseconds();
                }
            }
        }

        self.store.update(&exec).await?;
        Ok(exec)
    }
}
