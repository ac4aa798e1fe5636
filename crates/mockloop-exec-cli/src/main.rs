use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use mockloop_exec::{validate, ExecutionRequest, ExecutionSettings, Executor, SUPPORTED_LANGUAGE};

/// Run or validate interview code snippets and emit JSON results.
#[derive(Parser, Debug)]
#[command(name = "mockloop-exec-cli", about = "Run or validate interview code snippets")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute source in a sandboxed process and print an ExecutionResult
    Run(RunArgs),
    /// Check source syntax without running it and print a ValidationResult
    Validate(SourceArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Read source from file instead of stdin
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Test-case fragment appended after the source (repeatable)
    #[arg(long = "test-case")]
    test_cases: Vec<String>,

    /// Language tag of the submission
    #[arg(long, default_value = SUPPORTED_LANGUAGE)]
    language: String,

    /// Interpreter launched for the composed script
    #[arg(long, default_value = "python3")]
    interpreter: PathBuf,

    /// Wall-clock timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Directory for temporary scripts (default: system temp dir)
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
}

impl SourceArgs {
    fn read(&self) -> anyhow::Result<String> {
        match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display())),
            None => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("reading stdin")?;
                Ok(buf)
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    match cli.command {
        Command::Run(args) => {
            let settings = ExecutionSettings {
                interpreter: args.interpreter,
                timeout_ms: args.timeout.saturating_mul(1_000),
                scratch_dir: args.scratch_dir.unwrap_or_else(std::env::temp_dir),
                ..ExecutionSettings::default()
            };
            let request = ExecutionRequest {
                source_code: args.source.read()?,
                language: args.language,
                test_cases: args.test_cases,
            };

            // Failures of the executed code are encoded in the JSON; only
            // request-level errors make the process exit non-zero.
            let result = Executor::new(settings).execute(&request)?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Validate(args) => {
            let result = validate(&args.read()?);
            println!("{}", serde_json::to_string(&result)?);
        }
    }
    Ok(())
}
