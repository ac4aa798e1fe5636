//! Public value types for the mockloop-exec library.
//!
//! This module defines the request-scoped data structures used throughout the
//! library:
//! - [`ExecutionSettings`]: how composed units are launched and bounded
//! - [`ExecutionRequest`]: source text, language tag and test-case fragments
//! - [`ExecutionResult`]: captured output and success flag of one execution
//! - [`ValidationResult`]: outcome of a parse-only syntax check
//! - [`ExecError`]: orchestration failures that prevent an execution attempt

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only language tag accepted by [`crate::Executor::execute`]
/// (compared case-insensitively).
pub const SUPPORTED_LANGUAGE: &str = "python";

/// Substituted for stdout when a run produced neither stdout nor stderr.
pub const NO_OUTPUT_PLACEHOLDER: &str = "Code executed successfully (no output)";

/// Default wall-clock bound for one sandboxed process: 10 seconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default per-stream capture cap: 1 MiB.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1_048_576;

/// Default time a request waits for an admission slot: 30 seconds.
pub const DEFAULT_ADMISSION_TIMEOUT_MS: u64 = 30_000;

/// Configuration that governs how composed units are executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Program launched for every composed unit. Never discovered implicitly.
    /// Default: `python3` (resolved through `PATH`).
    pub interpreter: PathBuf,

    /// Extra arguments placed before the script path.
    pub interpreter_args: Vec<String>,

    /// Wall-clock bound in milliseconds before the process is killed.
    /// Default: 10,000 ms.
    pub timeout_ms: u64,

    /// Working directory of the sandboxed process and home of the
    /// temporary script files. Default: [`std::env::temp_dir`].
    pub scratch_dir: PathBuf,

    /// Maximum number of bytes kept per captured stream.
    /// Default: 1,048,576 bytes (1 MiB).
    pub max_output_bytes: usize,

    /// Maximum number of sandboxed processes alive at once.
    /// `None` (the default) leaves spawning unbounded.
    pub max_concurrent: Option<usize>,

    /// How long a request waits for an admission slot, in milliseconds.
    /// Only meaningful when `max_concurrent` is set. Default: 30,000 ms.
    pub admission_timeout_ms: u64,
}

impl ExecutionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn admission_timeout(&self) -> Duration {
        Duration::from_millis(self.admission_timeout_ms)
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            interpreter_args: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            scratch_dir: std::env::temp_dir(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent: None,
            admission_timeout_ms: DEFAULT_ADMISSION_TIMEOUT_MS,
        }
    }
}

/// One code-execution request. Transient; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language: String,
    /// Candidate test-case fragments, in submission order.
    pub test_cases: Vec<String>,
}

impl ExecutionRequest {
    /// A Python request with no test cases.
    pub fn python(source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            language: SUPPORTED_LANGUAGE.to_string(),
            test_cases: Vec::new(),
        }
    }

    pub fn with_test_cases<I, S>(mut self, test_cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_cases = test_cases.into_iter().map(Into::into).collect();
        self
    }
}

/// The outcome of running one composed unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Everything the process wrote to stdout (lossy UTF-8).
    pub stdout: String,

    /// Everything the process wrote to stderr, or the runner's own failure
    /// message on timeout and launch failure.
    pub stderr: String,

    /// `true` iff the process exited with status 0.
    pub succeeded: bool,

    /// Wall-clock duration of a completed process; `0` on timeout or
    /// launch failure.
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    /// A failed result carrying only a runner-supplied message on stderr.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            succeeded: false,
            elapsed_ms: 0,
        }
    }

    /// Replaces an entirely blank result's stdout with
    /// [`NO_OUTPUT_PLACEHOLDER`] so the response is never silently empty.
    pub fn with_placeholder(mut self) -> Self {
        if self.stdout.is_empty() && self.stderr.is_empty() {
            self.stdout = NO_OUTPUT_PLACEHOLDER.to_string();
        }
        self
    }
}

/// The outcome of a parse-only syntax check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Empty when valid; otherwise `"Syntax error on line N: <message>"`.
    pub error_message: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: String::new(),
        }
    }

    pub fn invalid(error_message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: error_message.into(),
        }
    }
}

/// Failures that stop a request before (or instead of) an execution attempt.
///
/// Failures of the sandboxed code itself are never represented here: they
/// come back as an [`ExecutionResult`] with `succeeded == false`.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The request's language tag is not [`SUPPORTED_LANGUAGE`].
    #[error("Only Python is currently supported")]
    UnsupportedLanguage { language: String },

    /// The composed unit could not be materialized in the scratch directory.
    #[error("cannot prepare script in scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    /// No admission slot became free within the configured wait.
    #[error("execution capacity exhausted: {limit} sandboxed processes already running")]
    Saturated { limit: usize },
}
