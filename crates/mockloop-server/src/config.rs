//! Runtime configuration from command-line flags with environment fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::{HeaderValue, Method};
use clap::Parser;
use mockloop_exec::types::{DEFAULT_ADMISSION_TIMEOUT_MS, DEFAULT_MAX_OUTPUT_BYTES};
use mockloop_exec::ExecutionSettings;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

#[derive(Parser, Debug, Clone)]
#[command(name = "mockloop-server", version, about = "MockLoop code execution API")]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    #[arg(long, env = "MOCKLOOP_BIND_ADDR", default_value = "127.0.0.1:8000")]
    pub bind_addr: SocketAddr,

    /// Interpreter launched for every composed script
    #[arg(long, env = "MOCKLOOP_INTERPRETER", default_value = "python3")]
    pub interpreter: PathBuf,

    /// Wall-clock timeout of one execution, in seconds
    #[arg(long, env = "MOCKLOOP_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Working directory and temp-file location for executions
    #[arg(long, env = "MOCKLOOP_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Bytes kept per captured output stream
    #[arg(long, env = "MOCKLOOP_MAX_OUTPUT_BYTES", default_value_t = DEFAULT_MAX_OUTPUT_BYTES)]
    pub max_output_bytes: usize,

    /// Maximum simultaneous sandboxed processes (unbounded when unset)
    #[arg(long, env = "MOCKLOOP_MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// How long a request waits for a sandbox slot, in milliseconds
    #[arg(long, env = "MOCKLOOP_ADMISSION_TIMEOUT_MS", default_value_t = DEFAULT_ADMISSION_TIMEOUT_MS)]
    pub admission_timeout_ms: u64,

    /// Origins allowed by CORS (comma-separated)
    #[arg(
        long,
        env = "MOCKLOOP_FRONTEND_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub frontend_origins: Vec<String>,

    #[arg(long, env = "MOCKLOOP_APP_NAME", default_value = "MockLoop API")]
    pub app_name: String,

    /// Deployment environment label reported by /health
    #[arg(long, env = "MOCKLOOP_ENVIRONMENT", default_value = "local")]
    pub environment: String,

    #[arg(long, short, env = "MOCKLOOP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            interpreter: self.interpreter.clone(),
            interpreter_args: Vec::new(),
            timeout_ms: self.timeout_secs.saturating_mul(1_000),
            scratch_dir: self
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            max_output_bytes: self.max_output_bytes,
            max_concurrent: self.max_concurrent,
            admission_timeout_ms: self.admission_timeout_ms,
        }
    }
}

/// CORS for the configured frontend origins, with credentials.
///
/// Methods and headers mirror the preflight request: credentials cannot be
/// combined with wildcard values.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) if value == "*" => {
                log::warn!("ignoring wildcard CORS origin; credentials require explicit origins");
                None
            }
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::list([Method::GET, Method::POST, Method::OPTIONS]))
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_execution_settings() {
        let config = ServerConfig::parse_from(["mockloop-server"]);
        let settings = config.execution_settings();
        assert_eq!(settings.timeout_ms, config.timeout_secs * 1_000);
        assert_eq!(settings.max_concurrent, config.max_concurrent);
        assert_eq!(settings.interpreter, config.interpreter);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = ServerConfig::parse_from([
            "mockloop-server",
            "--timeout-secs",
            "3",
            "--max-concurrent",
            "8",
            "--scratch-dir",
            "/var/tmp/mockloop",
            "--frontend-origins",
            "http://a.test,http://b.test",
        ]);
        let settings = config.execution_settings();
        assert_eq!(settings.timeout_ms, 3_000);
        assert_eq!(settings.max_concurrent, Some(8));
        assert_eq!(settings.scratch_dir, PathBuf::from("/var/tmp/mockloop"));
        assert_eq!(config.frontend_origins, vec!["http://a.test", "http://b.test"]);
    }
}
