//! Pluggable persistence of execution records.
//!
//! Two backends implement the same trait: an in-process concurrent map for
//! single-node deployments, and Consul KV when state must survive behind a
//! load balancer. Both must tolerate concurrent calls from the job manager
//! and the periodic cleaner.

mod consul;
mod memory;

pub use consul::ConsulStore;
pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::types::{Execution, ExecutionStatus};

/// Persistence operations for execution records. Returned records are
/// snapshots; mutations only happen through `update`, which replaces the
/// whole record.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new record; `AlreadyExists` if the id is taken.
    async fn create(&self, exec: &Execution) -> Result<(), StorageError>;

    /// Fetch a record by id; `NotFound` if absent.
    async fn get(&self, id: &str) -> Result<Execution, StorageError>;

    /// Replace an existing record; `NotFound` if absent.
    async fn update(&self, exec: &Execution) -> Result<(), StorageError>;

    /// Record the sandbox handle for a job, but only while its status is
    /// still `running`. A record that has already reached a terminal state
    /// is left untouched; the check and the write are atomic against
    /// concurrent transitions.
    async fn set_container_handle(&self, id: &str, handle: &str) -> Result<(), StorageError>;

    /// Remove a record. Deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// All records, optionally filtered by status.
    async fn list(&self, status: Option<ExecutionStatus>) -> Result<Vec<Execution>, StorageError>;

    /// Delete terminal records created more than `older_than` ago. Running
    /// and pending records are never touched, whatever their age.
    async fn cleanup(&self, older_than: Duration) -> Result<(), StorageError>;
}
