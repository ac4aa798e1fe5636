//! Thread-safe capture buffer for a sandboxed process's stdout and stderr.
//!
//! One reader thread per pipe writes into a shared [`OutputBuffer`] while the
//! runner waits on the child. Each stream keeps at most `max_bytes`; anything
//! beyond is drained from the pipe (so the child never blocks on a full pipe)
//! but discarded, and a truncation notice is appended when the strings are
//! produced.
//!
//! # Timeout path
//!
//! After a timeout the reader threads are abandoned and may still hold clones.
//! [`into_strings`](OutputBuffer::into_strings) tries `Arc::try_unwrap` first
//! and falls back to locking and cloning the data.

use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Which captured stream a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Default)]
struct StreamBuf {
    bytes: Vec<u8>,
    dropped: usize,
}

impl StreamBuf {
    fn push(&mut self, data: &[u8], max_bytes: usize) {
        let room = max_bytes.saturating_sub(self.bytes.len());
        let kept = room.min(data.len());
        self.bytes.extend_from_slice(&data[..kept]);
        self.dropped += data.len() - kept;
    }

    fn render(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("[output truncated after {} bytes]\n", self.bytes.len()));
        }
        text
    }
}

struct OutputBufferInner {
    stdout: StreamBuf,
    stderr: StreamBuf,
    max_bytes: usize,
}

impl OutputBufferInner {
    fn stream(&mut self, stream: Stream) -> &mut StreamBuf {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }

    fn render(&self) -> (String, String) {
        (self.stdout.render(), self.stderr.render())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Captured stdout and stderr of one process.
///
/// Cheap to clone; all clones share the same underlying data.
#[derive(Clone)]
pub struct OutputBuffer {
    inner: Arc<Mutex<OutputBufferInner>>,
}

impl OutputBuffer {
    /// Creates a buffer keeping up to `max_bytes` per stream.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputBufferInner {
                stdout: StreamBuf::default(),
                stderr: StreamBuf::default(),
                max_bytes,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutputBufferInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `data` to `stream`, discarding whatever exceeds the cap.
    pub fn write(&self, stream: Stream, data: &[u8]) {
        let mut inner = self.lock();
        let max_bytes = inner.max_bytes;
        inner.stream(stream).push(data, max_bytes);
    }

    /// Returns `true` if any bytes of `stream` were discarded.
    pub fn is_truncated(&self, stream: Stream) -> bool {
        self.lock().stream(stream).dropped > 0
    }

    /// Copies everything from `reader` into `stream` until EOF.
    pub fn drain_from<R: Read>(&self, stream: Stream, mut reader: R) -> io::Result<()> {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => self.write(stream, &chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Consumes this handle and returns `(stdout, stderr)` as lossy UTF-8.
    pub fn into_strings(self) -> (String, String) {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .render(),
            Err(shared) => shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .render(),
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_are_kept_apart() {
        let buf = OutputBuffer::new(64);
        buf.write(Stream::Stdout, b"out\n");
        buf.write(Stream::Stderr, b"err\n");
        assert_eq!(buf.into_strings(), ("out\n".to_string(), "err\n".to_string()));
    }

    #[test]
    fn test_cap_is_per_stream() {
        let buf = OutputBuffer::new(4);
        buf.write(Stream::Stdout, b"1234");
        buf.write(Stream::Stderr, b"abcd");
        assert!(!buf.is_truncated(Stream::Stdout));
        assert!(!buf.is_truncated(Stream::Stderr));
    }

    #[test]
    fn test_overflow_is_truncated_with_notice() {
        let buf = OutputBuffer::new(5);
        buf.write(Stream::Stdout, b"hello world");
        assert!(buf.is_truncated(Stream::Stdout));
        let (stdout, stderr) = buf.into_strings();
        assert_eq!(stdout, "hello\n[output truncated after 5 bytes]\n");
        assert_eq!(stderr, "");
    }

    #[test]
    fn test_writes_after_cap_are_dropped() {
        let buf = OutputBuffer::new(3);
        buf.write(Stream::Stderr, b"ab");
        buf.write(Stream::Stderr, b"cd");
        buf.write(Stream::Stderr, b"ef");
        let (_, stderr) = buf.into_strings();
        assert!(stderr.starts_with("abc\n"), "got {stderr:?}");
    }

    #[test]
    fn test_drain_from_reader() {
        let buf = OutputBuffer::new(1024);
        buf.drain_from(Stream::Stdout, &b"line one\nline two\n"[..])
            .expect("in-memory read");
        let (stdout, _) = buf.into_strings();
        assert_eq!(stdout, "line one\nline two\n");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let buf = OutputBuffer::new(16);
        buf.write(Stream::Stdout, &[b'o', b'k', 0xFF]);
        let (stdout, _) = buf.into_strings();
        assert_eq!(stdout, "ok\u{FFFD}");
    }

    #[test]
    fn test_into_strings_with_live_clone() {
        let buf = OutputBuffer::new(16);
        let clone = buf.clone();
        clone.write(Stream::Stdout, b"partial");
        let (stdout, _) = buf.into_strings();
        assert_eq!(stdout, "partial");
        drop(clone);
    }
}
