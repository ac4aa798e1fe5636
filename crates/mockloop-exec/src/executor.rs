//! Request-level orchestration for one code execution:
//! 1. Rejects unsupported language tags before anything else happens.
//! 2. Classifies the test-case fragments ([`classify_all`]).
//! 3. Builds the composed unit ([`compose`]).
//! 4. Obtains an admission slot from the [`AdmissionLimiter`].
//! 5. Runs the unit in a sandboxed process ([`run_unit`]).
//! 6. Applies the no-output placeholder to the result.
//!
//! ## Thread safety
//!
//! Each call is independent: the only shared pieces are the limiter's counter
//! and the classification cache, both internally synchronized. An
//! [`Executor`] can be shared behind an `Arc` and called from many threads.

use crate::classifier::classify_all;
use crate::composer::compose;
use crate::limiter::AdmissionLimiter;
use crate::runner::run_unit;
use crate::types::{
    ExecError, ExecutionRequest, ExecutionResult, ExecutionSettings, ValidationResult,
    SUPPORTED_LANGUAGE,
};
use crate::validator;

/// Executes requests under one set of [`ExecutionSettings`].
pub struct Executor {
    settings: ExecutionSettings,
    limiter: AdmissionLimiter,
}

impl Executor {
    pub fn new(settings: ExecutionSettings) -> Self {
        let limiter = AdmissionLimiter::new(settings.max_concurrent);
        Self { settings, limiter }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Number of sandboxed processes currently running through this executor.
    pub fn in_flight(&self) -> usize {
        self.limiter.in_flight()
    }

    /// Run `request` and return its structured outcome.
    ///
    /// Blocks the calling thread until the sandboxed process exits or the
    /// timeout fires.
    ///
    /// # Errors
    /// - [`ExecError::UnsupportedLanguage`] before any process is spawned.
    /// - [`ExecError::Saturated`] when no admission slot frees up in time.
    /// - [`ExecError::Scratch`] when the composed unit cannot be written.
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError> {
        ensure_supported(&request.language)?;

        let fragments = classify_all(&request.test_cases);
        let unit = compose(&request.source_code, &fragments);

        let _permit = self
            .limiter
            .acquire(self.settings.admission_timeout())
            .ok_or_else(|| ExecError::Saturated {
                limit: self.limiter.capacity().unwrap_or_default(),
            })?;

        let result = run_unit(&unit, &self.settings)?;
        Ok(result.with_placeholder())
    }

    /// Parse-only syntax check of `source`. Never spawns a process.
    pub fn validate(&self, source: &str) -> ValidationResult {
        validator::validate(source)
    }
}

/// Execute `request` with a one-off, unbounded [`Executor`].
pub fn execute(
    request: &ExecutionRequest,
    settings: ExecutionSettings,
) -> Result<ExecutionResult, ExecError> {
    Executor::new(settings).execute(request)
}

/// Accept `language` iff it equals [`SUPPORTED_LANGUAGE`], ignoring ASCII case.
pub fn ensure_supported(language: &str) -> Result<(), ExecError> {
    if language.eq_ignore_ascii_case(SUPPORTED_LANGUAGE) {
        Ok(())
    } else {
        log::info!("rejecting execution request for language {language:?}");
        Err(ExecError::UnsupportedLanguage {
            language: language.to_string(),
        })
    }
}
