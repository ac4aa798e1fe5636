//! Request and response bodies plus the handlers behind `/api/code/*` and
//! `/health`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use mockloop_exec::{ExecutionRequest, ExecutionResult, ValidationResult, SUPPORTED_LANGUAGE};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

fn default_language() -> String {
    SUPPORTED_LANGUAGE.to_string()
}

/// Body of both `POST /api/code/execute` and `POST /api/code/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExecutionRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<String>,
}

impl From<CodeExecutionRequest> for ExecutionRequest {
    fn from(body: CodeExecutionRequest) -> Self {
        ExecutionRequest {
            source_code: body.code,
            language: body.language,
            test_cases: body.test_cases,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExecutionResponse {
    pub output: String,
    pub error: String,
    pub success: bool,
    pub execution_time_ms: u64,
}

impl From<ExecutionResult> for CodeExecutionResponse {
    fn from(result: ExecutionResult) -> Self {
        CodeExecutionResponse {
            output: result.stdout,
            error: result.stderr,
            success: result.succeeded,
            execution_time_ms: result.elapsed_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub error: String,
}

impl From<ValidationResult> for ValidationResponse {
    fn from(result: ValidationResult) -> Self {
        ValidationResponse {
            valid: result.is_valid,
            error: result.error_message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub app_name: String,
}

/// Handler for `POST /api/code/execute`.
///
/// The sandboxed run blocks, so it is moved onto tokio's blocking pool.
pub async fn execute_code(
    State(state): State<AppState>,
    Json(body): Json<CodeExecutionRequest>,
) -> Result<Json<CodeExecutionResponse>, ApiError> {
    let request = ExecutionRequest::from(body);
    log::debug!(
        "execute: {} bytes of source, {} test cases",
        request.source_code.len(),
        request.test_cases.len()
    );

    let executor = Arc::clone(&state.executor);
    let result = tokio::task::spawn_blocking(move || executor.execute(&request)).await??;
    if !result.succeeded {
        log::debug!("execution finished unsuccessfully");
    }
    Ok(Json(result.into()))
}

/// Handler for `POST /api/code/validate`. `language` and `test_cases` are ignored.
pub async fn validate_code(
    State(state): State<AppState>,
    Json(body): Json<CodeExecutionRequest>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let executor = Arc::clone(&state.executor);
    let result = tokio::task::spawn_blocking(move || executor.validate(&body.code)).await?;
    Ok(Json(result.into()))
}

/// Handler for `GET /health`.
pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        environment: state.environment.to_string(),
        app_name: state.app_name.to_string(),
    })
}
