//! Consul KV record store, spoken over the plain HTTP API.
//!
//! Each record is serialized to JSON and stored at
//! `<prefix>/executions/<id>`. Creation uses check-and-set against index 0,
//! which atomically refuses to overwrite an existing key. Malformed stored
//! values are skipped when listing, and cleanup is best effort: per-entry
//! failures are logged and skipped so one bad key cannot stall retention.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;

use super::JobStore;
use crate::errors::StorageError;
use crate::types::{Execution, ExecutionStatus};

/// One entry of a Consul KV read response; values come back base64-encoded.
/// `ModifyIndex` is the check-and-set token for conditional writes.
#[derive(Debug, Deserialize)]
struct KvPair {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: Option<String>,
    #[serde(rename = "ModifyIndex", default)]
    modify_index: u64,
}

/// Record store backed by Consul KV.
pub struct ConsulStore {
    client: reqwest::Client,
    base_url: String,
    key_prefix: String,
    token: Option<String>,
}

impl ConsulStore {
    /// `address` is host:port of the Consul agent, e.g. `localhost:8500`.
    pub fn new(address: &str, key_prefix: &str, token: Option<String>) -> Self {
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{address}")
        };
        Self {
            client: reqwest::Client::new(),
            base_url,
            key_prefix: key_prefix.to_string(),
            token,
        }
    }

    /// Verify the agent is reachable; used at startup to decide whether to
    /// fall back to the in-memory store.
    pub async fn ping(&self) -> Result<(), StorageError> {
        let url = format!("{}/v1/status/leader", self.base_url);
        let response = self.request(self.client.get(&url)).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Backend(format!(
                "consul answered {} to a leader probe",
                response.status()
            )))
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("X-Consul-Token", token),
            None => builder,
        }
    }

    fn key_url(&self, id: &str) -> String {
        format!(
            "{}/v1/kv/{}/executions/{}",
            self.base_url, self.key_prefix, id
        )
    }

    /// Read a record and the modify index to check-and-set against.
    async fn fetch(&self, id: &str) -> Result<Option<(Execution, u64)>, StorageError> {
        let response = self.request(self.client.get(self.key_url(id))).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let pairs: Vec<KvPair> = response.error_for_status()?.json().await?;
        match pairs.into_iter().next() {
            Some(pair) => Ok(Some((decode_record(&pair)?, pair.modify_index))),
            None => Ok(None),
        }
    }

    /// Write a record. With `cas` set, the write only lands if the key's
    /// modify index still matches (0 means "must not exist yet"); the
    /// returned bool is whether Consul accepted it.
    async fn put(&self, exec: &Execution, cas: Option<u64>) -> Result<bool, StorageError> {
        let mut url = self.key_url(&exec.id);
        if let Some(index) = cas {
            url.push_str(&format!("?cas={index}"));
        }
        let body = serde_json::to_vec(exec)?;
        let response = self
            .request(self.client.put(url).body(body))
            .send()
            .await?
            .error_for_status()?;
        let accepted: bool = response.text().await?.trim().parse().unwrap_or(false);
        Ok(accepted)
    }
}

fn decode_record(pair: &KvPair) -> Result<Execution, StorageError> {
    let encoded = pair
        .value
        .as_deref()
        .ok_or_else(|| StorageError::Backend("kv entry has no value".to_string()))?;
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| StorageError::Backend(format!("kv value is not base64: {e}")))?;
    Ok(serde_json::from_slice(&raw)?)
}

#[async_trait]
impl JobStore for ConsulStore {
    async fn create(&self, exec: &Execution) -> Result<(), StorageError> {
        if self.put(exec, Some(0)).await? {
            Ok(())
        } else {
            Err(StorageError::AlreadyExists(exec.id.clone()))
        }
    }

    async fn get(&self, id: &str) -> Result<Execution, StorageError> {
        self.fetch(id)
            .await?
            .map(|(exec, _)| exec)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn update(&self, exec: &Execution) -> Result<(), StorageError> {
        if self.fetch(&exec.id).await?.is_none() {
            return Err(StorageError::NotFound(exec.id.clone()));
        }
        self.put(exec, None).await?;
        Ok(())
    }

    async fn set_container_handle(&self, id: &str, handle: &str) -> Result<(), StorageError> {
        // Check-and-set against the modify index read with the record, so a
        // terminal transition landing in between makes the write a no-op
        // instead of resurrecting a stale status.
        for _ in 0..3 {
            let Some((mut exec, index)) = self.fetch(id).await? else {
                return Err(StorageError::NotFound(id.to_string()));
            };
            if exec.status != ExecutionStatus::Running {
                return Ok(());
            }
            exec.container_handle = handle.to_string();
            if self.put(&exec, Some(index)).await? {
                return Ok(());
            }
        }
        // Lost every check-and-set race; whoever won holds fresher state.
        log::debug!("job {id}: gave up recording container handle after contention");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.request(self.client.delete(self.key_url(id)))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn list(&self, status: Option<ExecutionStatus>) -> Result<Vec<Execution>, StorageError> {
        let url = format!(
            "{}/v1/kv/{}/executions/?recurse=true",
            self.base_url, self.key_prefix
        );
        let response = self.request(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let pairs: Vec<KvPair> = response.error_for_status()?.json().await?;

        let mut records = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            match decode_record(pair) {
                Ok(exec) => {
                    if status.map_or(true, |s| exec.status == s) {
                        records.push(exec);
                    }
                }
                Err(e) => {
                    log::debug!("skipping malformed kv entry {}: {}", pair.key, e);
                }
            }
        }
        Ok(records)
    }

    async fn cleanup(&self, older_than: Duration) -> Result<(), StorageError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| StorageError::Backend(e.to_string()))?;

        for exec in self.list(None).await? {
            if exec.status.is_terminal() && exec.created_at < cutoff {
                if let Err(e) = self.delete(&exec.id).await {
                    log::warn!("cleanup failed to delete {}: {}", exec.id, e);
                }
            }
        }
        Ok(())
    }
}
