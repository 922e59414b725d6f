//! Request shaping and endpoint handlers.
//!
//! Two request shapes reduce to the same internal submission: a multipart
//! form carrying a prebuilt tar plus metadata JSON, and a small JSON body
//! for single-shot evaluation. Everything here validates untrusted input
//! down to a `Metadata` + tar pair before the job manager sees it.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use pyexec_core::executor::split_result;
use pyexec_core::{archive, imports};
use pyexec_core::{ExecutionConfig, ExecutionResult, Metadata};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::AppState;

/// Upper bound on the summed source size for the JSON shape.
pub const MAX_EVAL_SOURCE_BYTES: usize = 100 * 1024;

/// Upper bound on a multipart submission body.
pub const MAX_MULTIPART_BYTES: usize = 100 * 1024 * 1024;

const SUPPORTED_PYTHON_VERSIONS: [&str; 4] = ["3.10", "3.11", "3.12", "3.13"];

fn python_image(version: &str) -> Option<&'static str> {
    match version {
        "3.10" => Some("python:3.10-slim"),
        "3.11" => Some("python:3.11-slim"),
        "3.12" => Some("python:3.12-slim"),
        "3.13" => Some("python:3.13-slim"),
        _ => None,
    }
}

/// One source file of a JSON submission.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeFile {
    pub name: String,
    pub content: String,
}

/// The JSON request shape: either `code` or `files`, plus optional knobs.
#[derive(Debug, Default, Deserialize)]
pub struct EvalRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub files: Vec<CodeFile>,
    #[serde(default)]
    pub entrypoint: String,
    #[serde(default)]
    pub stdin: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub python_version: String,
    #[serde(default)]
    pub eval_last_expr: bool,
    #[serde(default)]
    pub config: Option<ExecutionConfig>,
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/v1/exec/sync
pub async fn exec_sync(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExecutionResult>> {
    let (tar_bytes, metadata) = parse_multipart(multipart).await?;
    let exec = state.manager.submit_sync(metadata, tar_bytes).await?;
    Ok(Json(exec.to_result()))
}

/// POST /api/v1/exec/async
pub async fn exec_async(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let (tar_bytes, metadata) = parse_multipart(multipart).await?;
    let id = state.manager.submit_async(metadata, tar_bytes).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "execution_id": id })),
    ))
}

/// GET /api/v1/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionResult>> {
    let exec = state.manager.get(&id).await?;
    Ok(Json(exec.to_result()))
}

/// DELETE /api/v1/executions/{id}
pub async fn kill_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let status = state.manager.kill(&id).await?;
    Ok(Json(serde_json::json!({ "status": status })))
}

/// POST /api/v1/eval
pub async fn eval(
    State(state): State<AppState>,
    Json(req): Json<EvalRequest>,
) -> Result<Json<ExecutionResult>> {
    let has_code = !req.code.is_empty();
    let has_files = !req.files.is_empty();
    if has_code == has_files {
        return Err(ApiError::BadRequest(
            "exactly one of 'code' or 'files' must be provided".to_string(),
        ));
    }

    let image = if req.python_version.is_empty() {
        String::new()
    } else {
        python_image(&req.python_version)
            .ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "unsupported python_version {:?}; supported versions: {}",
                    req.python_version,
                    SUPPORTED_PYTHON_VERSIONS.join(", ")
                ))
            })?
            .to_string()
    };

    let files: Vec<(String, String)> = if has_files {
        req.files
            .iter()
            .map(|f| (f.name.clone(), f.content.clone()))
            .collect()
    } else {
        vec![("main.py".to_string(), req.code.clone())]
    };

    let total: usize = files.iter().map(|(_, content)| content.len()).sum();
    if total > MAX_EVAL_SOURCE_BYTES {
        return Err(ApiError::PayloadTooLarge(format!(
            "total code size {total} bytes exceeds limit of {MAX_EVAL_SOURCE_BYTES} bytes"
        )));
    }

    let tar_bytes = archive::build_archive(
        files.iter().map(|(name, content)| (name.as_str(), content.as_str())),
    )
    .map_err(|e| ApiError::Internal(format!("building archive: {e}")))?;

    let entrypoint = if !req.entrypoint.is_empty() {
        req.entrypoint.clone()
    } else if has_files {
        req.files[0].name.clone()
    } else {
        "main.py".to_string()
    };
    if !files.iter().any(|(name, _)| *name == entrypoint) {
        return Err(ApiError::BadRequest(format!(
            "entrypoint {entrypoint:?} is not among the submitted files"
        )));
    }

    // Static scan of every submitted source; user-pinned lines win.
    let mut detected = String::new();
    for (name, content) in &files {
        if name.ends_with(".py") {
            let found = imports::detect_requirements(content);
            detected = imports::merge_requirements(&found, &detected);
        }
    }
    let requirements = imports::merge_requirements(&detected, &req.requirements);

    let eval_last_expr = req.eval_last_expr && has_code;
    let metadata = Metadata {
        entrypoint,
        image,
        requirements,
        pre_commands: Vec::new(),
        stdin: req.stdin.clone(),
        env_vars: Vec::new(),
        script_args: Vec::new(),
        config: req.config.clone(),
        eval_last_expr,
    };

    let exec = state.manager.submit_sync(metadata, tar_bytes).await?;
    let mut result = exec.to_result();
    if eval_last_expr {
        let (stdout, captured) = split_result(&result.stdout);
        result.stdout = stdout;
        result.result = captured;
    }
    Ok(Json(result))
}

/// Pull the tar bytes and metadata JSON out of a multipart submission and
/// validate them down to an internal request.
async fn parse_multipart(mut multipart: Multipart) -> Result<(Vec<u8>, Metadata)> {
    let mut tar_bytes: Option<Vec<u8>> = None;
    let mut metadata: Option<Metadata> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("parsing form: {e}")))?
    {
        match field.name() {
            Some("tar") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("reading tar: {e}")))?;
                tar_bytes = Some(bytes.to_vec());
            }
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("reading metadata: {e}")))?;
                let parsed: Metadata = serde_json::from_str(&text)
                    .map_err(|e| ApiError::BadRequest(format!("parsing metadata: {e}")))?;
                metadata = Some(parsed);
            }
            _ => {}
        }
    }

    let tar_bytes = tar_bytes.ok_or_else(|| ApiError::BadRequest("missing tar file".to_string()))?;
    let mut metadata =
        metadata.ok_or_else(|| ApiError::BadRequest("missing metadata".to_string()))?;

    shape_metadata(&mut metadata, &tar_bytes)?;
    Ok((tar_bytes, metadata))
}

/// Validate a multipart submission: archive safety, entrypoint resolution
/// and presence, and env entry shape.
fn shape_metadata(metadata: &mut Metadata, tar_bytes: &[u8]) -> Result<()> {
    archive::validate_archive(tar_bytes)?;
    let files = archive::list_files(tar_bytes)?;

    if metadata.entrypoint.is_empty() {
        metadata.entrypoint = archive::detect_entrypoint(tar_bytes)?;
    } else {
        if !metadata.entrypoint.ends_with(".py") {
            return Err(ApiError::BadRequest(format!(
                "entrypoint {:?} must be a .py file",
                metadata.entrypoint
            )));
        }
        if !files.iter().any(|f| *f == metadata.entrypoint) {
            return Err(ApiError::BadRequest(format!(
                "entrypoint {:?} is not present in the archive",
                metadata.entrypoint
            )));
        }
    }

    for entry in &metadata.env_vars {
        if !entry.contains('=') {
            return Err(ApiError::BadRequest(format!(
                "env_vars entry {entry:?} is not in KEY=value form"
            )));
        }
    }

    Ok(())
}
