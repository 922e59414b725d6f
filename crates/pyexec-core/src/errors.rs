//! Error types for the execution service.
//!
//! Each subsystem owns a small enum; callers convert at the boundary they
//! care about. Engine-level failures are kept distinct from non-zero script
//! exits: the latter are ordinary completed executions.

use thiserror::Error;

/// Errors raised by the tar service.
#[derive(Error, Debug)]
pub enum TarError {
    #[error("malformed archive: {0}")]
    BadArchive(String),
    #[error("unsafe path in archive: {0}")]
    UnsafePath(String),
    #[error("no python entrypoint found in archive")]
    NoEntrypoint,
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by a container runtime adapter implementation.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("container engine error: {0}")]
    Engine(#[from] bollard::errors::Error),
    #[error("{0}")]
    Other(String),
}

/// Engine-level failure taxonomy. None of these carry an exit code; a job
/// that produced one completed, whatever the code was.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("pulling image {image}: {source}")]
    ImagePullFailed { image: String, source: RuntimeError },
    #[error("creating sandbox: {0}")]
    SandboxCreateFailed(RuntimeError),
    #[error("copying files into sandbox: {0}")]
    CopyInFailed(RuntimeError),
    #[error("starting sandbox: {0}")]
    StartFailed(RuntimeError),
    #[error("waiting for sandbox: {0}")]
    WaitFailed(RuntimeError),
    #[error("execution timeout after {0} seconds")]
    Timeout(u64),
    #[error("collecting sandbox logs: {0}")]
    LogsFailed(RuntimeError),
}

/// Errors raised by a job store backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("execution {0} not found")]
    NotFound(String),
    #[error("execution {0} already exists")]
    AlreadyExists(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored record is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Errors returned by the job manager to the HTTP layer.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("killing container: {0}")]
    Kill(RuntimeError),
}
