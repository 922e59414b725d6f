//! Data model shared by the job manager, the stores, and the HTTP surface.
//!
//! The wire types here mirror what clients send and receive; the stored
//! `Execution` record is the authoritative state the manager owns. Optional
//! wire fields use `skip_serializing_if` so responses stay small and stable
//! for callers that poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Record created, sandbox not yet started.
    Pending,
    /// Sandbox dispatched; a container may be live.
    Running,
    /// The program ran to exit; check `exit_code` for success.
    Completed,
    /// The engine failed to run the program (image pull, timeout, runtime error).
    Failed,
    /// Terminated on request.
    Killed,
}

impl ExecutionStatus {
    /// Terminal states never transition again and are eligible for cleanup.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Killed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Killed => "killed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource ceiling for one job, as supplied on the wire.
///
/// Zero means "not supplied" for the numeric fields and is replaced by the
/// server default when the engine resolves the config. `network_disabled` is
/// the one field whose zero value (`false`) is meaningful; it is carried
/// verbatim into the resolved config and never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub network_disabled: bool,
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub disk_mb: u64,
    #[serde(default)]
    pub cpu_shares: u64,
}

/// Execution parameters for one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Relative path of the Python file to run, as stored in the archive.
    pub entrypoint: String,
    /// Container image; empty means the server default.
    #[serde(default)]
    pub image: String,
    /// Contents of a requirements.txt to install before running.
    #[serde(default)]
    pub requirements: String,
    /// Shell commands run verbatim before dependency installation.
    #[serde(default)]
    pub pre_commands: Vec<String>,
    /// Data offered on standard input.
    #[serde(default)]
    pub stdin: String,
    /// Environment entries in `KEY=value` form.
    #[serde(default)]
    pub env_vars: Vec<String>,
    /// Arguments passed to the script (`sys.argv[1..]`).
    #[serde(default)]
    pub script_args: Vec<String>,
    /// Resource limits; absent fields take server defaults.
    #[serde(default)]
    pub config: Option<ExecutionConfig>,
    /// Run the entrypoint through the expression-capturing wrapper.
    /// Set internally by the JSON request shape, never from metadata JSON.
    #[serde(skip)]
    pub eval_last_expr: bool,
}

/// Stored state of one execution. The job manager is the only writer except
/// for the kill path, which is reconciled by the absorbing `killed` status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub status: ExecutionStatus,
    pub metadata: Metadata,
    /// Identifier of the live sandbox while running; empty otherwise.
    #[serde(default)]
    pub container_handle: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: i64,
    /// Engine-level failure message when `status` is `failed`.
    #[serde(default)]
    pub error: String,
    /// Python exception type parsed from stderr, e.g. `NameError`.
    #[serde(default)]
    pub error_type: String,
    /// Source line of the failure parsed from the traceback; 0 when unknown.
    #[serde(default)]
    pub error_line: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: i64,
}

impl Execution {
    /// Fresh record in `pending`, timestamped now.
    pub fn new(id: String, metadata: Metadata) -> Self {
        Self {
            id,
            status: ExecutionStatus::Pending,
            metadata,
            container_handle: String::new(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            error: String::new(),
            error_type: String::new(),
            error_line: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            duration_ms: 0,
        }
    }

    /// Wire representation returned to API callers.
    pub fn to_result(&self) -> ExecutionResult {
        ExecutionResult {
            execution_id: self.id.clone(),
            status: self.status,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            exit_code: self.exit_code,
            error: self.error.clone(),
            error_type: self.error_type.clone(),
            error_line: self.error_line,
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: self.duration_ms,
            result: None,
        }
    }
}

fn is_empty(s: &String) -> bool {
    s.is_empty()
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

/// Response body for execution queries and synchronous submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub stdout: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub stderr: String,
    pub exit_code: i64,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub error_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub duration_ms: i64,
    /// `repr()` of the final expression, present only for JSON submissions
    /// that requested expression capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Response body for asynchronous submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncResponse {
    pub execution_id: String,
}

/// Response body for the kill endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillResponse {
    pub status: String,
}

/// Everything the execution engine needs to run one job.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub job_id: String,
    pub tar_bytes: Vec<u8>,
    pub metadata: Metadata,
}

/// What the engine hands back on success. A non-zero `exit_code` is a script
/// failure, not an engine failure.
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub duration_ms: i64,
}
