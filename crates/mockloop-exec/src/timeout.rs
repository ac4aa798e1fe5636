use std::io;
use std::process::{Child, ExitStatus};
use std::time::Duration;

use wait_timeout::ChildExt;

/// How a bounded wait on a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The child exited on its own within the bound.
    Exited(ExitStatus),
    /// The bound elapsed; the child has been killed and reaped.
    TimedOut,
}

/// Wait at most `timeout` for `child` to exit.
///
/// On timeout the child's process group and then the child itself are sent
/// SIGKILL, and the child is reaped so no zombie is left behind. Kill and reap
/// errors are ignored: the only way they fail is when the child already
/// exited between the wait and the kill.
///
/// The group kill only reaches descendants when the child was started as the
/// leader of its own group.
pub fn wait_or_kill(child: &mut Child, timeout: Duration) -> io::Result<WaitOutcome> {
    match child.wait_timeout(timeout)? {
        Some(status) => Ok(WaitOutcome::Exited(status)),
        None => {
            kill_process_group(child.id());
            let _ = child.kill();
            let _ = child.wait();
            Ok(WaitOutcome::TimedOut)
        }
    }
}

/// Send SIGKILL to the process group led by `leader`.
///
/// A group that no longer exists is not an error worth reporting.
#[cfg(unix)]
pub fn kill_process_group(leader: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(leader) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        log::debug!("killpg({pgid}): {e}");
    }
}

#[cfg(not(unix))]
pub fn kill_process_group(_leader: u32) {}

/// Render a timeout for messages: whole seconds without a fraction.
pub fn format_seconds(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        timeout.as_secs_f64().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::Instant;

    fn sh(script: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn sh")
    }

    #[test]
    fn test_fast_child_exits() {
        let mut child = sh("exit 0");
        let outcome = wait_or_kill(&mut child, Duration::from_secs(5)).expect("wait");
        match outcome {
            WaitOutcome::Exited(status) => assert!(status.success()),
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[test]
    fn test_exit_code_is_reported() {
        let mut child = sh("exit 3");
        let outcome = wait_or_kill(&mut child, Duration::from_secs(5)).expect("wait");
        match outcome {
            WaitOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[test]
    fn test_slow_child_is_killed_promptly() {
        let mut child = sh("sleep 5");
        let start = Instant::now();
        let outcome = wait_or_kill(&mut child, Duration::from_millis(100)).expect("wait");
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "took {:?}",
            start.elapsed()
        );
        // Already reaped: a second wait returns immediately.
        assert!(child.try_wait().expect("try_wait").is_some());
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_secs(10)), "10");
        assert_eq!(format_seconds(Duration::from_millis(250)), "0.25");
        assert_eq!(format_seconds(Duration::from_millis(1500)), "1.5");
    }
}
