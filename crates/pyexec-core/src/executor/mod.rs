//! The execution engine: one job, end to end.
//!
//! Given a prepared request, the engine resolves limits against server
//! defaults, ensures the image, creates the sandbox, copies the submitted
//! tree in, runs the command under the job deadline and harvests output.
//! Container destruction is owned here and survives every failure path,
//! including deadline expiry and panics, via a drop guard whose cleanup is
//! not bound to the job deadline.

mod command;

pub use command::{build_command, shell_quote, split_result, EVAL_WRAPPER_CODE, RESULT_MARKER};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::{Config, DefaultsConfig};
use crate::errors::ExecutorError;
use crate::runtime::{ContainerRuntime, ContainerSpec};
use crate::types::{ExecutionOutput, ExecutionRequest, Metadata};

/// Fully resolved limits for one job. Unlike the wire config, every field
/// here is concrete; building one is the only place defaulting happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub timeout_seconds: u64,
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub cpu_shares: u64,
    pub network_disabled: bool,
    pub image: String,
}

/// Layer server defaults under the supplied config. A zero numeric field or
/// empty image means "not supplied"; `network_disabled` has no such sentinel
/// and is carried over verbatim.
pub fn resolve_config(metadata: &Metadata, defaults: &DefaultsConfig) -> ResolvedConfig {
    let supplied = metadata.config.clone().unwrap_or_default();
    let pick = |value: u64, default: u64| if value == 0 { default } else { value };
    ResolvedConfig {
        timeout_seconds: pick(supplied.timeout_seconds, defaults.timeout_seconds),
        memory_mb: pick(supplied.memory_mb, defaults.memory_mb),
        disk_mb: pick(supplied.disk_mb, defaults.disk_mb),
        cpu_shares: pick(supplied.cpu_shares, defaults.cpu_shares),
        network_disabled: supplied.network_disabled,
        image: if metadata.image.is_empty() {
            defaults.image.clone()
        } else {
            metadata.image.clone()
        },
    }
}

/// Removes the container when dropped. The normal path calls `release` and
/// awaits the removal; unwinding falls back to a detached task so cleanup
/// still happens without an executor to await it.
struct ContainerGuard {
    runtime: Arc<dyn ContainerRuntime>,
    handle: String,
    released: bool,
}

impl ContainerGuard {
    fn new(runtime: Arc<dyn ContainerRuntime>, handle: String) -> Self {
        Self {
            runtime,
            handle,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.runtime.remove(&self.handle).await {
            log::warn!("failed to remove container {}: {}", self.handle, e);
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let runtime = self.runtime.clone();
        let handle = self.handle.clone();
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                if let Err(e) = runtime.remove(&handle).await {
                    log::warn!("failed to remove container {handle}: {e}");
                }
            });
        }
    }
}

/// Runs one job inside a freshly created container and tears it down.
pub struct ExecutionEngine {
    runtime: Arc<dyn ContainerRuntime>,
    config: Arc<Config>,
}

impl ExecutionEngine {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: Arc<Config>) -> Self {
        Self { runtime, config }
    }

    /// Run the request to completion. `handle_tx`, when supplied, receives
    /// the container handle as soon as the sandbox exists so the caller can
    /// make it reachable for cancellation.
    pub async fn execute(
        &self,
        req: &ExecutionRequest,
        handle_tx: Option<oneshot::Sender<String>>,
    ) -> Result<ExecutionOutput, ExecutorError> {
        let started = std::time::Instant::now();
        let resolved = resolve_config(&req.metadata, &self.config.defaults);
        let deadline = Instant::now() + Duration::from_secs(resolved.timeout_seconds);

        tokio::time::timeout_at(deadline, self.runtime.ensure_image(&resolved.image))
            .await
            .map_err(|_| ExecutorError::Timeout(resolved.timeout_seconds))?
            .map_err(|source| ExecutorError::ImagePullFailed {
                image: resolved.image.clone(),
                source,
            })?;

        let spec = ContainerSpec {
            image: resolved.image.clone(),
            command: build_command(&req.metadata),
            env: req.metadata.env_vars.clone(),
            memory_mb: resolved.memory_mb,
            cpu_shares: resolved.cpu_shares,
            disk_mb: resolved.disk_mb,
            network_mode: if resolved.network_disabled {
                None
            } else {
                Some(self.config.docker.network_mode.clone())
            },
            dns_servers: self.config.docker.dns_servers.clone(),
            open_stdin: !req.metadata.stdin.is_empty(),
        };

        let handle = tokio::time::timeout_at(deadline, self.runtime.create(&spec))
            .await
            .map_err(|_| ExecutorError::Timeout(resolved.timeout_seconds))?
            .map_err(ExecutorError::SandboxCreateFailed)?;
        log::debug!("job {}: created container {}", req.job_id, handle);

        if let Some(tx) = handle_tx {
            let _ = tx.send(handle.clone());
        }

        let guard = ContainerGuard::new(self.runtime.clone(), handle.clone());
        let outcome = self.run(&handle, req, &resolved, deadline).await;
        guard.release().await;

        let (exit_code, stdout, stderr) = outcome?;
        log::info!(
            "job {}: container exited with code {} after {:?}",
            req.job_id,
            exit_code,
            started.elapsed()
        );
        Ok(ExecutionOutput {
            stdout,
            stderr,
            exit_code,
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }

    async fn run(
        &self,
        handle: &str,
        req: &ExecutionRequest,
        resolved: &ResolvedConfig,
        deadline: Instant,
    ) -> Result<(i64, String, String), ExecutorError> {
        let lifecycle = async {
            self.runtime
                .copy_in(handle, "/work", req.tar_bytes.clone())
                .await
                .map_err(ExecutorError::CopyInFailed)?;
            self.runtime
                .start(handle)
                .await
                .map_err(ExecutorError::StartFailed)?;
            self.runtime
                .wait(handle)
                .await
                .map_err(ExecutorError::WaitFailed)
        };

        let exit_code = match tokio::time::timeout_at(deadline, lifecycle).await {
            Ok(result) => result?,
            Err(_) => {
                log::warn!(
                    "job {}: deadline of {}s expired, killing container {}",
                    req.job_id,
                    resolved.timeout_seconds,
                    handle
                );
                if let Err(e) = self.runtime.kill(handle).await {
                    log::warn!("job {}: kill after timeout failed: {}", req.job_id, e);
                }
                return Err(ExecutorError::Timeout(resolved.timeout_seconds));
            }
        };

        // Harvesting runs outside the deadline: output written just before
        // expiry must still be collectable.
        let (stdout, stderr) = self
            .runtime
            .logs(handle)
            .await
            .map_err(ExecutorError::LogsFailed)?;
        Ok((exit_code, stdout, stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RuntimeError;
    use crate::types::ExecutionConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn defaults() -> DefaultsConfig {
        Config::default().defaults
    }

    #[test]
    fn resolve_fills_only_zero_fields() {
        let metadata = Metadata {
            entrypoint: "main.py".to_string(),
            config: Some(ExecutionConfig {
                timeout_seconds: 60,
                memory_mb: 0,
                disk_mb: 512,
                cpu_shares: 0,
                network_disabled: false,
            }),
            ..Metadata::default()
        };
        let resolved = resolve_config(&metadata, &defaults());
        assert_eq!(resolved.timeout_seconds, 60);
        assert_eq!(resolved.memory_mb, 1024);
        assert_eq!(resolved.disk_mb, 512);
        assert_eq!(resolved.cpu_shares, 1024);
        assert_eq!(resolved.image, "python:3.12-slim");
    }

    #[test]
    fn resolve_preserves_network_disabled_both_ways() {
        for flag in [false, true] {
            let metadata = Metadata {
                entrypoint: "main.py".to_string(),
                config: Some(ExecutionConfig {
                    network_disabled: flag,
                    ..ExecutionConfig::default()
                }),
                ..Metadata::default()
            };
            let resolved = resolve_config(&metadata, &defaults());
            assert_eq!(resolved.network_disabled, flag);
        }
    }

    #[test]
    fn resolve_is_idempotent() {
        let metadata = Metadata {
            entrypoint: "main.py".to_string(),
            ..Metadata::default()
        };
        let once = resolve_config(&metadata, &defaults());
        let again = resolve_config(
            &Metadata {
                entrypoint: "main.py".to_string(),
                image: once.image.clone(),
                config: Some(ExecutionConfig {
                    timeout_seconds: once.timeout_seconds,
                    memory_mb: once.memory_mb,
                    disk_mb: once.disk_mb,
                    cpu_shares: once.cpu_shares,
                    network_disabled: once.network_disabled,
                }),
                ..Metadata::default()
            },
            &defaults(),
        );
        assert_eq!(once, again);
    }

    #[test]
    fn resolve_keeps_explicit_image() {
        let metadata = Metadata {
            entrypoint: "main.py".to_string(),
            image: "python:3.11-alpine".to_string(),
            ..Metadata::default()
        };
        let resolved = resolve_config(&metadata, &defaults());
        assert_eq!(resolved.image, "python:3.11-alpine");
    }

    /// Scripted runtime that records every call.
    struct MockRuntime {
        calls: Mutex<Vec<String>>,
        exit_code: i64,
        wait_secs: u64,
        fail_wait: bool,
        logs: (String, String),
    }

    impl MockRuntime {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                exit_code: 0,
                wait_secs: 0,
                fail_wait: false,
                logs: ("out".to_string(), "err".to_string()),
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn ensure_image(&self, _image: &str) -> Result<(), RuntimeError> {
            self.record("ensure_image");
            Ok(())
        }
        async fn create(&self, _spec: &ContainerSpec) -> Result<String, RuntimeError> {
            self.record("create");
            Ok("c-1".to_string())
        }
        async fn copy_in(&self, _h: &str, _p: &str, _t: Vec<u8>) -> Result<(), RuntimeError> {
            self.record("copy_in");
            Ok(())
        }
        async fn start(&self, _h: &str) -> Result<(), RuntimeError> {
            self.record("start");
            Ok(())
        }
        async fn wait(&self, _h: &str) -> Result<i64, RuntimeError> {
            self.record("wait");
            if self.fail_wait {
                return Err(RuntimeError::Other("daemon went away".to_string()));
            }
            tokio::time::sleep(Duration::from_secs(self.wait_secs)).await;
            Ok(self.exit_code)
        }
        async fn kill(&self, _h: &str) -> Result<(), RuntimeError> {
            self.record("kill");
            Ok(())
        }
        async fn logs(&self, _h: &str) -> Result<(String, String), RuntimeError> {
            self.record("logs");
            Ok(self.logs.clone())
        }
        async fn remove(&self, _h: &str) -> Result<(), RuntimeError> {
            self.record("remove");
            Ok(())
        }
    }

    fn engine_with(runtime: Arc<MockRuntime>) -> ExecutionEngine {
        ExecutionEngine::new(runtime, Arc::new(Config::default()))
    }

    fn request(timeout_seconds: u64) -> ExecutionRequest {
        ExecutionRequest {
            job_id: "exe_test".to_string(),
            tar_bytes: Vec::new(),
            metadata: Metadata {
                entrypoint: "main.py".to_string(),
                config: Some(ExecutionConfig {
                    timeout_seconds,
                    ..ExecutionConfig::default()
                }),
                ..Metadata::default()
            },
        }
    }

    #[tokio::test]
    async fn successful_run_follows_lifecycle_and_removes() {
        let runtime = Arc::new(MockRuntime::new());
        let engine = engine_with(runtime.clone());

        let (tx, rx) = oneshot::channel();
        let output = engine.execute(&request(5), Some(tx)).await.unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert_eq!(rx.await.unwrap(), "c-1");
        assert_eq!(
            runtime.calls(),
            vec!["ensure_image", "create", "copy_in", "start", "wait", "logs", "remove"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_kills_and_removes() {
        let mut mock = MockRuntime::new();
        mock.wait_secs = 3600;
        let runtime = Arc::new(mock);
        let engine = engine_with(runtime.clone());

        let err = engine.execute(&request(2), None).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Timeout(2)));

        let calls = runtime.calls();
        assert!(calls.contains(&"kill".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("remove"));
        assert!(!calls.contains(&"logs".to_string()));
    }

    #[tokio::test]
    async fn wait_failure_still_removes() {
        let mut mock = MockRuntime::new();
        mock.fail_wait = true;
        let runtime = Arc::new(mock);
        let engine = engine_with(runtime.clone());

        let err = engine.execute(&request(5), None).await.unwrap_err();
        assert!(matches!(err, ExecutorError::WaitFailed(_)));
        assert_eq!(runtime.calls().last().map(String::as_str), Some("remove"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_engine_error() {
        let mut mock = MockRuntime::new();
        mock.exit_code = 1;
        let runtime = Arc::new(mock);
        let engine = engine_with(runtime.clone());

        let output = engine.execute(&request(5), None).await.unwrap();
        assert_eq!(output.exit_code, 1);
    }
}
