//! Sandboxed runner: executes one composed unit in a separate OS process.
//!
//! ## Procedure
//!
//! 1. Materialize the unit into a uniquely named `mockloop-*.py` file inside
//!    [`ExecutionSettings::scratch_dir`]. The file is owned by a
//!    [`TempPath`] and deleted when the run ends, on every path.
//! 2. Launch `interpreter [interpreter_args..] <script>` with the scratch
//!    directory as working directory, stdin on the null device and both
//!    output pipes captured by reader threads into an [`OutputBuffer`].
//! 3. Wait at most [`ExecutionSettings::timeout`]; kill the process on expiry.
//!
//! On Unix the interpreter leads its own process group. Expiry kills the whole
//! group, as does a group member still holding the output pipes when the
//! deadline passes after the interpreter itself has exited.
//!
//! ## Isolation actually provided
//!
//! A separate process, a bounded wall-clock duration and a private temp file.
//! There is no filesystem, network, CPU, memory or syscall confinement: the
//! process runs with the service's own privileges. Untrusted multi-tenant
//! input needs OS-level isolation (container, jail, VM) underneath.

use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempPath;

use crate::output::{OutputBuffer, Stream};
use crate::timeout::{format_seconds, kill_process_group, wait_or_kill, WaitOutcome};
use crate::types::{ExecError, ExecutionResult, ExecutionSettings};

/// File name prefix of materialized composed units.
pub const SCRIPT_PREFIX: &str = "mockloop-";

/// Minimum time granted to the reader threads after the child has exited.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Run `unit` and report its outcome.
///
/// Failures of the executed code (non-zero exit, timeout) and failures to
/// launch the interpreter come back as `Ok` with `succeeded == false`. Only a
/// scratch directory that cannot hold the script yields
/// [`ExecError::Scratch`].
pub fn run_unit(unit: &str, settings: &ExecutionSettings) -> Result<ExecutionResult, ExecError> {
    let script = materialize(unit, &settings.scratch_dir)?;
    let result = launch(&script, settings);
    if let Err(e) = script.close() {
        log::debug!("failed to remove composed unit: {e}");
    }
    Ok(result)
}

fn materialize(unit: &str, scratch_dir: &Path) -> Result<TempPath, ExecError> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRIPT_PREFIX)
        .suffix(".py")
        .tempfile_in(scratch_dir)
        .map_err(ExecError::Scratch)?;
    file.write_all(unit.as_bytes()).map_err(ExecError::Scratch)?;
    file.flush().map_err(ExecError::Scratch)?;
    Ok(file.into_temp_path())
}

fn launch(script: &Path, settings: &ExecutionSettings) -> ExecutionResult {
    let mut command = Command::new(&settings.interpreter);
    command
        .args(&settings.interpreter_args)
        .arg(script)
        .current_dir(&settings.scratch_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    log::debug!(
        "launching {} for {}",
        settings.interpreter.display(),
        script.display()
    );
    let started = Instant::now();
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            log::warn!(
                "failed to launch {}: {e}",
                settings.interpreter.display()
            );
            return ExecutionResult::failure(format!("Execution error: {e}"));
        }
    };

    match supervise(&mut child, settings, started) {
        Ok(result) => result,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("lost track of sandboxed process: {e}");
            ExecutionResult::failure(format!("Execution error: {e}"))
        }
    }
}

fn supervise(
    child: &mut Child,
    settings: &ExecutionSettings,
    started: Instant,
) -> std::io::Result<ExecutionResult> {
    let timeout = settings.timeout();
    let pid = child.id();
    let output = OutputBuffer::new(settings.max_output_bytes);
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let mut readers = 0;
    if let Some(pipe) = child.stdout.take() {
        spawn_reader(pipe, Stream::Stdout, output.clone(), done_tx.clone())?;
        readers += 1;
    }
    if let Some(pipe) = child.stderr.take() {
        spawn_reader(pipe, Stream::Stderr, output.clone(), done_tx.clone())?;
        readers += 1;
    }
    drop(done_tx);

    match wait_or_kill(child, timeout)? {
        WaitOutcome::TimedOut => {
            log::warn!("sandboxed process exceeded {timeout:?}; killed");
            // The group is gone, so the pipes close and the readers finish.
            Ok(ExecutionResult::failure(format!(
                "Code execution timed out after {} seconds",
                format_seconds(timeout)
            )))
        }
        WaitOutcome::Exited(status) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;

            // A backgrounded grandchild can keep the pipes open; collect
            // output until the original deadline at the latest, then kill
            // whatever is left of the process group.
            let deadline = started
                .checked_add(timeout)
                .unwrap_or(started)
                .max(Instant::now() + READER_GRACE);
            let mut pending = readers;
            while pending > 0 {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if done_rx.recv_timeout(remaining).is_err() {
                    break;
                }
                pending -= 1;
            }
            if pending > 0 {
                log::debug!("output pipes still open after exit; killing process group");
                kill_process_group(pid);
                while pending > 0 && done_rx.recv_timeout(READER_GRACE).is_ok() {
                    pending -= 1;
                }
            }

            let (stdout, stderr) = output.into_strings();
            Ok(ExecutionResult {
                stdout,
                stderr,
                succeeded: status.success(),
                elapsed_ms,
            })
        }
    }
}

fn spawn_reader<R>(
    pipe: R,
    stream: Stream,
    output: OutputBuffer,
    done: mpsc::Sender<()>,
) -> std::io::Result<()>
where
    R: std::io::Read + Send + 'static,
{
    let name = match stream {
        Stream::Stdout => "mockloop-stdout",
        Stream::Stderr => "mockloop-stderr",
    };
    thread::Builder::new().name(name.to_string()).spawn(move || {
        if let Err(e) = output.drain_from(stream, pipe) {
            log::debug!("{name} reader stopped: {e}");
        }
        let _ = done.send(());
    })?;
    Ok(())
}
