//! Background line reader for one child output pipe
//!
//! Each reader owns a pipe and forwards complete, trimmed lines onto an
//! unbounded channel until EOF. Both readers of a job share one channel, so
//! lines from stdout and stderr are queued in arrival order, each tagged with
//! the stream it came from. Read errors end the stream quietly; the
//! supervisor only ever sees "closed".

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_CHUNK: usize = 8 * 1024;

/// Which child pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One non-empty output line tagged with its stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Sets the shared closed flag when the reader task ends, however it ends
struct ClosedGuard(Arc<AtomicBool>);

impl Drop for ClosedGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Handle to a spawned reader task
#[derive(Debug)]
pub struct LineStreamReader {
    stream: OutputStream,
    closed: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl LineStreamReader {
    /// Spawn a reader over `pipe`, sending every non-empty line to `lines`
    ///
    /// Lines are split on `\n` and on bare `\r` (progress redraws), decoded
    /// lossily, trimmed and tagged with `stream`.
    pub fn spawn<R>(
        stream: OutputStream,
        pipe: R,
        lines: mpsc::UnboundedSender<OutputLine>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let closed = Arc::new(AtomicBool::new(false));
        let guard = ClosedGuard(Arc::clone(&closed));

        let handle = tokio::spawn(async move {
            let _guard = guard;
            read_lines(stream, pipe, lines).await;
        });

        Self {
            stream,
            closed,
            handle,
        }
    }

    /// Stream name (`stdout` or `stderr`)
    pub fn name(&self) -> &'static str {
        self.stream.as_str()
    }

    /// Whether the reader has reached EOF or stopped
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait up to `within` for the reader to hit EOF, then abort it
    pub async fn finish(mut self, within: Duration) {
        match tokio::time::timeout(within, &mut self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{} reader ended abnormally: {}", self.stream, e),
            Err(_) => {
                debug!(
                    "{} reader still open after {:?}, aborting",
                    self.stream, within
                );
                self.handle.abort();
            }
        }
    }

    /// Stop the reader immediately
    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn read_lines<R>(
    stream: OutputStream,
    mut pipe: R,
    lines: mpsc::UnboundedSender<OutputLine>,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("{} read failed, treating as closed: {}", stream, e);
                break;
            }
        };

        for &byte in &chunk[..read] {
            if byte == b'\n' || byte == b'\r' {
                if !flush(stream, &mut pending, &lines) {
                    return;
                }
            } else {
                pending.push(byte);
            }
        }
    }

    flush(stream, &mut pending, &lines);
    debug!("{} reached end of stream", stream);
}

/// Send the pending fragment if it is non-empty; false once the receiver is gone
fn flush(
    stream: OutputStream,
    pending: &mut Vec<u8>,
    lines: &mpsc::UnboundedSender<OutputLine>,
) -> bool {
    if pending.is_empty() {
        return true;
    }

    let text = String::from_utf8_lossy(pending).trim().to_string();
    pending.clear();

    if text.is_empty() {
        return true;
    }
    lines.send(OutputLine { stream, text }).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn collect(input: &'static [u8]) -> Vec<String> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = LineStreamReader::spawn(OutputStream::Stdout, input, tx);
        reader.finish(Duration::from_secs(1)).await;

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            assert_eq!(line.stream, OutputStream::Stdout);
            lines.push(line.text);
        }
        lines
    }

    #[tokio::test]
    async fn test_splits_on_newlines_and_carriage_returns() {
        let lines = collect(b"first\r\nsecond\rthird\n\n   \n  fourth  ").await;
        assert_eq!(lines, vec!["first", "second", "third", "fourth"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let lines = collect(b"ok\n\xff\xfe 50%\nafter\n").await;
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("50%"));
        assert_eq!(lines[2], "after");
    }

    #[tokio::test]
    async fn test_closed_flag_after_eof() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let reader = LineStreamReader::spawn(OutputStream::Stdout, &b"line\n"[..], tx);

        for _ in 0..50 {
            if reader.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reader.is_closed());
        assert_eq!(reader.name(), "stdout");
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_reader() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let reader = LineStreamReader::spawn(OutputStream::Stderr, &b"a\nb\nc\n"[..], tx);
        reader.finish(Duration::from_secs(1)).await;
    }

    /// Test that two readers sharing a channel keep arrival order and tags
    #[tokio::test]
    async fn test_shared_channel_tags_streams() {
        let (mut out_writer, out_pipe) = tokio::io::duplex(64);
        let (mut err_writer, err_pipe) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout = LineStreamReader::spawn(OutputStream::Stdout, out_pipe, tx.clone());
        let stderr = LineStreamReader::spawn(OutputStream::Stderr, err_pipe, tx);

        err_writer.write_all(b"first\n").await.unwrap();
        let first = rx.recv().await.unwrap();
        out_writer.write_all(b"second\n").await.unwrap();
        let second = rx.recv().await.unwrap();

        assert_eq!(first.stream, OutputStream::Stderr);
        assert_eq!(first.text, "first");
        assert_eq!(second.stream, OutputStream::Stdout);
        assert_eq!(second.text, "second");

        stdout.abort();
        stderr.abort();
    }

    #[tokio::test]
    async fn test_abort_marks_closed() {
        let (_writer, pipe) = tokio::io::duplex(64);
        let (tx, _rx) = mpsc::unbounded_channel();
        let reader = LineStreamReader::spawn(OutputStream::Stdout, pipe, tx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_closed());

        reader.abort();
        for _ in 0..50 {
            if reader.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reader.is_closed());
    }
}
