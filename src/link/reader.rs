//! # Line Reader
//!
//! Adapts any byte stream into a [`LineSource`] with a bounded wait per read.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::warn;

use super::source_trait::{LineEvent, LineSource};
use crate::error::{GatewayError, Result};

/// Longest line accepted; longer lines are dropped up to their terminator
pub const MAX_LINE_BYTES: usize = 4096;

/// Buffered line reader over an async byte stream
///
/// Partially received lines survive a timed-out read: the bytes stay in the
/// buffer and the next call continues where the previous one stopped.
/// Invalid UTF-8 is replaced rather than rejected. The buffer never holds
/// more than [`MAX_LINE_BYTES`] + 1 bytes, however fast the stream is.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    /// Inside an over-long line; drop bytes until its terminator
    discarding: bool,
    read_timeout: Duration,
    name: String,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    /// Wrap a byte stream
    ///
    /// # Arguments
    ///
    /// * `inner` - Byte stream (serial port, TCP stream, ...)
    /// * `read_timeout` - Bounded wait for one line
    /// * `name` - Name used in logs
    pub fn new(inner: R, read_timeout: Duration, name: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::with_capacity(256),
            discarding: false,
            read_timeout,
            name: name.into(),
        }
    }

    fn take_line(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(|c: char| c == '\r' || c == '\n')
            .to_string();
        self.buf.clear();
        text
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for LineReader<R> {
    async fn next_line(&mut self) -> Result<LineEvent> {
        // One byte past the cap tells an over-long line from one that fits
        let room = (MAX_LINE_BYTES + 1).saturating_sub(self.buf.len()) as u64;
        let read = {
            let mut limited = (&mut self.reader).take(room);
            tokio::time::timeout(self.read_timeout, limited.read_until(b'\n', &mut self.buf)).await
        };

        match read {
            Err(_elapsed) => Ok(LineEvent::Idle),
            // EOF; flush whatever was left from an earlier partial read first
            Ok(Ok(0)) if self.buf.is_empty() => Ok(LineEvent::Closed),
            Ok(Ok(_)) => {
                let complete = self.buf.ends_with(b"\n");
                if !complete && self.buf.len() > MAX_LINE_BYTES {
                    if !self.discarding {
                        warn!(
                            "Discarding line longer than {} bytes from {}",
                            MAX_LINE_BYTES, self.name
                        );
                    }
                    self.discarding = true;
                    self.buf.clear();
                    return Ok(LineEvent::Idle);
                }
                if self.discarding {
                    // Tail of an over-long line
                    self.discarding = !complete;
                    self.buf.clear();
                    return Ok(LineEvent::Idle);
                }
                Ok(LineEvent::Line(self.take_line()))
            }
            Ok(Err(e)) => Err(GatewayError::TransientRead(e)),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_reads_lines_then_closed() {
        let mock = Builder::new()
            .read(b"temp=25.4\r\n")
            .read(b"{\"tilt\": 3.2}\n")
            .build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        assert_eq!(
            reader.next_line().await.unwrap(),
            LineEvent::Line("temp=25.4".to_string())
        );
        assert_eq!(
            reader.next_line().await.unwrap(),
            LineEvent::Line("{\"tilt\": 3.2}".to_string())
        );
        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Closed);
    }

    #[tokio::test]
    async fn test_multiple_lines_in_one_chunk() {
        let mock = Builder::new().read(b"a=1\nb=2\n").build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Line("a=1".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Line("b=2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_line_survives_timeout() {
        let mock = Builder::new()
            .read(b"temp=2")
            .wait(Duration::from_millis(500))
            .read(b"5.4\n")
            .build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Idle);
        let mut event = reader.next_line().await.unwrap();
        while event == LineEvent::Idle {
            event = reader.next_line().await.unwrap();
        }
        assert_eq!(event, LineEvent::Line("temp=25.4".to_string()));
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_flushed_at_eof() {
        let mock = Builder::new().read(b"tilt=7.0").build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Line("tilt=7.0".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Closed);
    }

    #[tokio::test]
    async fn test_overlong_line_is_dropped() {
        let long = vec![b'a'; MAX_LINE_BYTES * 2];
        let mock = Builder::new()
            .read(&long)
            .read(b"aaaa\ntemp=1\n")
            .build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        let mut lines = Vec::new();
        loop {
            match reader.next_line().await.unwrap() {
                LineEvent::Line(line) => lines.push(line),
                LineEvent::Idle => assert!(reader.buf.len() <= MAX_LINE_BYTES + 1),
                LineEvent::Closed => break,
            }
        }
        assert_eq!(lines, vec!["temp=1".to_string()]);
    }

    #[tokio::test]
    async fn test_line_at_cap_is_kept() {
        let mut line = vec![b'7'; MAX_LINE_BYTES];
        line.push(b'\n');
        let mock = Builder::new().read(&line).build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        match reader.next_line().await.unwrap() {
            LineEvent::Line(text) => assert_eq!(text.len(), MAX_LINE_BYTES),
            other => panic!("Expected a line, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mock = Builder::new().read(b"temp=\xFF21\n").build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        match reader.next_line().await.unwrap() {
            LineEvent::Line(line) => {
                assert!(line.starts_with("temp="));
                assert!(line.ends_with("21"));
            }
            other => panic!("Expected a line, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_error_is_transient() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::Other, "framing error"))
            .read(b"hum=40\n")
            .build();
        let mut reader = LineReader::new(mock, TIMEOUT, "mock");

        match reader.next_line().await {
            Err(GatewayError::TransientRead(e)) => assert_eq!(e.kind(), io::ErrorKind::Other),
            other => panic!("Expected TransientRead, got: {:?}", other),
        }
        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Line("hum=40".to_string()));
    }

    #[test]
    fn test_describe_uses_name() {
        let mock = Builder::new().build();
        let reader = LineReader::new(mock, TIMEOUT, "/dev/ttyUSB0");
        assert_eq!(reader.describe(), "/dev/ttyUSB0");
    }
}
