//! Capability-level interface to the container engine.
//!
//! The trait is deliberately narrow: the execution engine only ever needs to
//! ensure an image, run one container to completion, harvest its output and
//! destroy it. Implementations hold no job-level state, so a single instance
//! is shared by every in-flight job. The reference implementation targets
//! Docker; tests substitute scripted doubles.

mod docker;

pub use docker::DockerRuntime;

use async_trait::async_trait;

use crate::errors::RuntimeError;

/// Everything needed to create one sandbox container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    /// Single shell string, run as `sh -c <command>` in the work directory.
    pub command: String,
    /// Environment entries in `KEY=value` form.
    pub env: Vec<String>,
    pub memory_mb: u64,
    pub cpu_shares: u64,
    /// Size of the tmpfs mounted at the work directory.
    pub disk_mb: u64,
    /// `None` disables networking entirely; otherwise the engine network
    /// mode to attach (e.g. `host`, `bridge`).
    pub network_mode: Option<String>,
    pub dns_servers: Vec<String>,
    /// Keep stdin open for jobs that supply input.
    pub open_stdin: bool,
}

/// Synchronous contracts against the container engine. Calls block the task
/// until the engine has answered; cancellation is the caller's concern.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull `image` unless it is already present locally. Idempotent; blocks
    /// until the pull has fully drained.
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create a container (not started) and return its handle.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Stream an uncompressed tar into the container under `path`.
    async fn copy_in(&self, handle: &str, path: &str, tar: Vec<u8>) -> Result<(), RuntimeError>;

    async fn start(&self, handle: &str) -> Result<(), RuntimeError>;

    /// Block until the container exits and return its exit code.
    async fn wait(&self, handle: &str) -> Result<i64, RuntimeError>;

    /// Deliver SIGKILL. A no-op for containers that already exited.
    async fn kill(&self, handle: &str) -> Result<(), RuntimeError>;

    /// Full demultiplexed output captured so far.
    async fn logs(&self, handle: &str) -> Result<(String, String), RuntimeError>;

    /// Destroy the container and its writable layer.
    async fn remove(&self, handle: &str) -> Result<(), RuntimeError>;
}
