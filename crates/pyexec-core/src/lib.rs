//! Core engine for the pyexec remote Python execution service.
//!
//! This crate implements everything below the HTTP surface: submitted source
//! trees are materialized into throwaway Docker containers, run under enforced
//! resource and network limits, and harvested for output and diagnostics. The
//! design keeps untrusted input behind two narrow seams - the tar service on
//! the filesystem boundary and the container runtime adapter on the engine
//! boundary - so the rest of the system only handles validated data.
//!
//! # Subsystems
//!
//! - **Archive handling**: path-traversal-safe tar ingest and construction
//! - **Import scanning**: static dependency detection for submitted Python source
//! - **Traceback parsing**: structured error extraction from captured stderr
//! - **Container runtime adapter**: capability-level interface to the engine,
//!   with a Docker implementation
//! - **Execution engine**: one job end to end, from defaults to cleanup
//! - **Job store**: pluggable persistence (in-memory map or Consul KV)
//! - **Job manager**: the pending/running/terminal state machine and kill path

pub mod archive;
pub mod config;
pub mod errors;
pub mod executor;
pub mod imports;
pub mod manager;
pub mod runtime;
pub mod storage;
pub mod traceback;
pub mod types;

pub use config::Config;
pub use errors::{ExecutorError, ManagerError, RuntimeError, StorageError, TarError};
pub use executor::ExecutionEngine;
pub use manager::JobManager;
pub use runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
pub use storage::{ConsulStore, JobStore, MemoryStore};
pub use types::{
    Execution, ExecutionConfig, ExecutionOutput, ExecutionRequest, ExecutionResult,
    ExecutionStatus, Metadata,
};
