//! In-process record store: a map behind one reader-writer lock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::JobStore;
use crate::errors::StorageError;
use crate::types::{Execution, ExecutionStatus};

/// Default store for single-node deployments. Readers proceed concurrently;
/// any mutation takes the write half. Records handed out are clones, so a
/// caller can never mutate stored state in place.
#[derive(Default)]
pub struct MemoryStore {
    executions: RwLock<HashMap<String, Execution>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, exec: &Execution) -> Result<(), StorageError> {
        let mut map = self.executions.write().await;
        if map.contains_key(&exec.id) {
            return Err(StorageError::AlreadyExists(exec.id.clone()));
        }
        map.insert(exec.id.clone(), exec.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Execution, StorageError> {
        let map = self.executions.read().await;
        map.get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn update(&self, exec: &Execution) -> Result<(), StorageError> {
        let mut map = self.executions.write().await;
        if !map.contains_key(&exec.id) {
            return Err(StorageError::NotFound(exec.id.clone()));
        }
        map.insert(exec.id.clone(), exec.clone());
        Ok(())
    }

    async fn set_container_handle(&self, id: &str, handle: &str) -> Result<(), StorageError> {
        let mut map = self.executions.write().await;
        let exec = map
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        // Checked under the write lock: a record that already left running
        // keeps its terminal state and empty handle.
        if exec.status == ExecutionStatus::Running {
            exec.container_handle = handle.to_string();
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let mut map = self.executions.write().await;
        map.remove(id);
        Ok(())
    }

    async fn list(&self, status: Option<ExecutionStatus>) -> Result<Vec<Execution>, StorageError> {
        let map = self.executions.read().await;
        Ok(map
            .values()
            .filter(|exec| status.map_or(true, |s| exec.status == s))
            .cloned()
            .collect())
    }

    async fn cleanup(&self, older_than: Duration) -> Result<(), StorageError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        let mut map = self.executions.write().await;
        let before = map.len();
        map.retain(|_, exec| !(exec.status.is_terminal() && exec.created_at < cutoff));
        let removed = before - map.len();
        if removed > 0 {
            log::debug!("cleanup removed {removed} execution records");
        }
        Ok(())
    }
}
