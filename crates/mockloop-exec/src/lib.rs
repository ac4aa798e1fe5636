// mockloop-exec: sandboxed execution and parse-only validation of interview code snippets.

pub mod cache;
pub mod classifier;
pub mod composer;
pub mod executor;
pub mod limiter;
pub mod output;
pub mod runner;
pub mod timeout;
pub mod types;
pub mod validator;

pub use cache::ClassificationCache;
pub use classifier::{classify, classify_all, ClassifiedFragment, FragmentKind};
pub use composer::{compose, TEST_CASE_HEADER};
pub use executor::{ensure_supported, execute, Executor};
pub use limiter::{AdmissionLimiter, AdmissionPermit};
pub use output::OutputBuffer;
pub use runner::run_unit;
pub use types::{
    ExecError, ExecutionRequest, ExecutionResult, ExecutionSettings, ValidationResult,
    NO_OUTPUT_PLACEHOLDER, SUPPORTED_LANGUAGE,
};
pub use validator::validate;
