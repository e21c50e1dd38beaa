#![deny(warnings)]

// Framed JSON-RPC transport over a byte stream (stdin/stdout in production)

use crate::error::{Result, TransportError};
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    Stdin, Stdout,
};

/// Largest Content-Length body accepted. Bigger frames are skipped and
/// reported as invalid.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// Detect framing based on the first non-blank line.
    Auto,
    /// Newline-delimited JSON messages.
    Newline,
    /// JSON-RPC/LSP style framing: `Content-Length: N\r\n\r\n<json bytes>`
    ContentLength,
}

fn trim_crlf(s: &str) -> &str {
    s.trim_end_matches(&['\r', '\n'][..])
}

fn parse_content_length_header(line: &str) -> Option<usize> {
    // Case-insensitive header name, optional whitespace.
    let line = trim_crlf(line).trim();
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse::<usize>().ok()
}

/// Reads and writes one JSON-RPC message at a time. Replies use whatever
/// framing the peer was detected to use.
pub struct FramedTransport<R, W> {
    reader: R,
    writer: W,
    framing: Framing,
}

/// The process's stdin/stdout transport.
pub type StdioTransport = FramedTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        FramedTransport::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            framing: Framing::Auto,
        }
    }

    /// Read the next message body. Returns `TransportError::ConnectionClosed`
    /// at end of input. A malformed frame yields `TransportError::InvalidMessage`
    /// with the frame already consumed, so the caller can keep reading.
    pub async fn read_message(&mut self) -> Result<String> {
        match self.framing {
            Framing::Auto => self.read_auto().await,
            Framing::Newline => {
                let line = self.read_line().await?;
                Ok(trim_crlf(&line).to_string())
            }
            Framing::ContentLength => {
                let first = self.read_line().await?;
                self.read_content_length_body(trim_crlf(&first)).await
            }
        }
    }

    pub async fn write_message(&mut self, message: &str) -> Result<()> {
        if self.framing == Framing::ContentLength {
            let header = format!("Content-Length: {}\r\n\r\n", message.len());
            self.writer
                .write_all(header.as_bytes())
                .await
                .map_err(TransportError::Io)?;
            self.writer
                .write_all(message.as_bytes())
                .await
                .map_err(TransportError::Io)?;
        } else {
            self.writer
                .write_all(message.as_bytes())
                .await
                .map_err(TransportError::Io)?;
            self.writer.write_all(b"\n").await.map_err(TransportError::Io)?;
        }
        self.writer.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut raw = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut raw)
            .await
            .map_err(TransportError::Io)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed.into());
        }
        String::from_utf8(raw).map_err(|e| {
            TransportError::InvalidMessage(format!("Invalid UTF-8 in JSON-RPC message: {}", e))
                .into()
        })
    }

    async fn read_auto(&mut self) -> Result<String> {
        loop {
            let line = self.read_line().await?;
            let line = trim_crlf(&line);
            if line.trim().is_empty() {
                continue;
            }

            if parse_content_length_header(line).is_some() {
                tracing::debug!("stdio framing: content-length");
                self.framing = Framing::ContentLength;
                return self.read_content_length_body(line).await;
            }

            tracing::debug!("stdio framing: newline-delimited");
            self.framing = Framing::Newline;
            return Ok(line.to_string());
        }
    }

    async fn read_content_length_body(&mut self, first: &str) -> Result<String> {
        let content_length = parse_content_length_header(first).ok_or_else(|| {
            TransportError::InvalidMessage(format!("Expected Content-Length header, got: {}", first))
        })?;

        // Skip remaining headers up to the blank separator line.
        loop {
            let header = self.read_line().await?;
            if trim_crlf(&header).is_empty() {
                break;
            }
        }

        if content_length > MAX_FRAME_BYTES {
            tracing::warn!(content_length, "skipping oversized frame");
            let mut body = (&mut self.reader).take(content_length as u64);
            io::copy(&mut body, &mut io::sink())
                .await
                .map_err(TransportError::Io)?;
            return Err(TransportError::InvalidMessage(format!(
                "Content-Length {} exceeds the {} byte limit",
                content_length, MAX_FRAME_BYTES
            ))
            .into());
        }

        let mut buf = vec![0u8; content_length];
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(TransportError::Io)?;

        String::from_utf8(buf).map_err(|e| {
            TransportError::InvalidMessage(format!("Invalid UTF-8 in JSON-RPC message: {}", e))
                .into()
        })
    }
}
