//! End-to-end lifecycle tests for the job manager, driven through a scripted
//! container runtime so no Docker daemon is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pyexec_core::{
    Config, ContainerRuntime, ContainerSpec, ExecutionConfig, ExecutionEngine, ExecutionStatus,
    JobManager, MemoryStore, Metadata, RuntimeError,
};
use tokio::sync::Notify;

/// Runtime double with a scripted exit. `wait` blocks for `wait_secs` unless
/// killed first, in which case it reports the conventional SIGKILL code.
struct ScriptedRuntime {
    calls: Mutex<Vec<String>>,
    killed: Notify,
    wait_secs: u64,
    exit_code: i64,
    stdout: String,
    stderr: String,
    fail_start: bool,
}

impl ScriptedRuntime {
    fn finishing(exit_code: i64, stdout: &str, stderr: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            killed: Notify::new(),
            wait_secs: 0,
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            fail_start: false,
        }
    }

    fn hanging(stdout: &str) -> Self {
        Self {
            wait_secs: 3600,
            ..Self::finishing(0, stdout, "")
        }
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn ensure_image(&self, _image: &str) -> Result<(), RuntimeError> {
        self.record("ensure_image");
        Ok(())
    }
    async fn create(&self, _spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.record("create");
        Ok("container-1".to_string())
    }
    async fn copy_in(&self, _h: &str, _p: &str, _t: Vec<u8>) -> Result<(), RuntimeError> {
        self.record("copy_in");
        Ok(())
    }
    async fn start(&self, _h: &str) -> Result<(), RuntimeError> {
        self.record("start");
        if self.fail_start {
            return Err(RuntimeError::Other("image has no shell".to_string()));
        }
        Ok(())
    }
    async fn wait(&self, _h: &str) -> Result<i64, RuntimeError> {
        self.record("wait");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(self.wait_secs)) => Ok(self.exit_code),
            _ = self.killed.notified() => Ok(137),
        }
    }
    async fn kill(&self, _h: &str) -> Result<(), RuntimeError> {
        self.record("kill");
        self.killed.notify_waiters();
        Ok(())
    }
    async fn logs(&self, _h: &str) -> Result<(String, String), RuntimeError> {
        self.record("logs");
        Ok((self.stdout.clone(), self.stderr.clone()))
    }
    async fn remove(&self, _h: &str) -> Result<(), RuntimeError> {
        self.record("remove");
        Ok(())
    }
}

fn build_manager(runtime: Arc<ScriptedRuntime>) -> (JobManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = Arc::new(Config::default());
    let engine = Arc::new(ExecutionEngine::new(runtime.clone(), config));
    (JobManager::new(store.clone(), runtime, engine), store)
}

fn metadata() -> Metadata {
    Metadata {
        entrypoint: "main.py".to_string(),
        config: Some(ExecutionConfig {
            timeout_seconds: 30,
            ..ExecutionConfig::default()
        }),
        ..Metadata::default()
    }
}

async fn poll_until<F>(manager: &JobManager, id: &str, predicate: F) -> pyexec_core::Execution
where
    F: Fn(&pyexec_core::Execution) -> bool,
{
    for _ in 0..200 {
        let exec = manager.get(id).await.unwrap();
        if predicate(&exec) {
            return exec;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("record {id} never reached the expected state");
}

#[tokio::test]
async fn sync_submission_completes_with_output() {
    let runtime = Arc::new(ScriptedRuntime::finishing(0, "hello world\n", ""));
    let (manager, _) = build_manager(runtime.clone());

    let exec = manager.submit_sync(metadata(), Vec::new()).await.unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.exit_code, 0);
    assert_eq!(exec.stdout, "hello world\n");
    assert_eq!(exec.stderr, "");
    assert_eq!(exec.error_type, "");
    assert_eq!(exec.error_line, 0);
    assert!(exec.started_at.is_some());
    assert!(exec.finished_at.is_some());
    assert!(exec.container_handle.is_empty());
    assert_eq!(runtime.count("remove"), 1);
}

#[tokio::test]
async fn script_failure_parses_the_traceback() {
    let stderr = concat!(
        "Traceback (most recent call last):\n",
        "  File \"main.py\", line 1, in <module>\n",
        "    print(undefined_var)\n",
        "NameError: name 'undefined_var' is not defined\n",
    );
    let runtime = Arc::new(ScriptedRuntime::finishing(1, "", stderr));
    let (manager, _) = build_manager(runtime);

    let exec = manager.submit_sync(metadata(), Vec::new()).await.unwrap();

    // A non-zero exit is still a completed execution, not an engine failure.
    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.exit_code, 1);
    assert_eq!(exec.error_type, "NameError");
    assert_eq!(exec.error_line, 1);
    assert!(exec.stderr.contains("Traceback"));
}

#[tokio::test]
async fn engine_failure_marks_the_job_failed() {
    let mut scripted = ScriptedRuntime::finishing(0, "", "");
    scripted.fail_start = true;
    let runtime = Arc::new(scripted);
    let (manager, _) = build_manager(runtime.clone());

    let exec = manager.submit_sync(metadata(), Vec::new()).await.unwrap();

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert!(exec.error.contains("starting sandbox"));
    assert_eq!(exec.exit_code, 0);
    assert_eq!(runtime.count("remove"), 1);
}

#[tokio::test]
async fn timeout_fails_the_job_and_removes_the_container() {
    let runtime = Arc::new(ScriptedRuntime::hanging(""));
    let mut meta = metadata();
    meta.config = Some(ExecutionConfig {
        timeout_seconds: 1,
        ..ExecutionConfig::default()
    });
    let (manager, _) = build_manager(runtime.clone());

    let exec = manager.submit_sync(meta, Vec::new()).await.unwrap();

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert!(exec.error.contains("timeout"));
    assert_eq!(runtime.count("kill"), 1);
    assert_eq!(runtime.count("remove"), 1);
}

#[tokio::test]
async fn async_submission_is_observable_through_polling() {
    let runtime = Arc::new(ScriptedRuntime::finishing(0, "done\n", ""));
    let (manager, _) = build_manager(runtime);

    let id = manager.submit_async(metadata(), Vec::new()).await.unwrap();
    assert!(id.starts_with("exe_"));

    let early = manager.get(&id).await.unwrap();
    assert!(matches!(
        early.status,
        ExecutionStatus::Pending | ExecutionStatus::Running | ExecutionStatus::Completed
    ));

    let done = poll_until(&manager, &id, |e| e.status.is_terminal()).await;
    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.stdout, "done\n");
}

#[tokio::test]
async fn kill_in_flight_is_absorbing() {
    let runtime = Arc::new(ScriptedRuntime::hanging("partial output\n"));
    let (manager, _) = build_manager(runtime.clone());

    let id = manager.submit_async(metadata(), Vec::new()).await.unwrap();

    // Wait for the sandbox handle to be published, then kill.
    poll_until(&manager, &id, |e| !e.container_handle.is_empty()).await;
    let status = manager.kill(&id).await.unwrap();
    assert_eq!(status, "killed");

    // The worker observes the container exit and must preserve the killed
    // status while still recording whatever output was harvested.
    let done = poll_until(&manager, &id, |e| e.finished_at.is_some()).await;
    assert_eq!(done.status, ExecutionStatus::Killed);
    assert_eq!(done.stdout, "partial output\n");
    assert_eq!(done.exit_code, 137);
    assert!(done.container_handle.is_empty());
}

#[tokio::test]
async fn repeated_kill_reports_current_status_without_new_container_actions() {
    let runtime = Arc::new(ScriptedRuntime::hanging(""));
    let (manager, _) = build_manager(runtime.clone());

    let id = manager.submit_async(metadata(), Vec::new()).await.unwrap();
    poll_until(&manager, &id, |e| !e.container_handle.is_empty()).await;

    assert_eq!(manager.kill(&id).await.unwrap(), "killed");
    let kills_after_first = runtime.count("kill");
    assert_eq!(manager.kill(&id).await.unwrap(), "killed");
    assert_eq!(runtime.count("kill"), kills_after_first);
}

#[tokio::test]
async fn kill_of_a_completed_job_returns_its_status() {
    let runtime = Arc::new(ScriptedRuntime::finishing(0, "", ""));
    let (manager, _) = build_manager(runtime.clone());

    let exec = manager.submit_sync(metadata(), Vec::new()).await.unwrap();
    assert_eq!(manager.kill(&exec.id).await.unwrap(), "completed");
    assert_eq!(runtime.count("kill"), 0);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let runtime = Arc::new(ScriptedRuntime::finishing(0, "", ""));
    let (manager, _) = build_manager(runtime);

    let err = manager.get("exe_missing").await.unwrap_err();
    assert!(matches!(
        err,
        pyexec_core::ManagerError::Storage(pyexec_core::StorageError::NotFound(_))
    ));
}
