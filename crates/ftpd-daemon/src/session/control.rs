//! The control connection: command lines in, replies out.
//!
//! The worker owns the connection as one bidirectional stream and splits it
//! into a buffered read half for commands and a buffered write half for
//! replies. Any `AsyncRead + AsyncWrite` stream works, so tests drive
//! sessions over `tokio::io::duplex`.

use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::time::timeout;

use ftpd_core::Reply;

use crate::error::ControlError;

/// Longest accepted command line, terminator included.
pub const MAX_COMMAND_LINE: usize = 4096;

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

type ReadHalf = Box<dyn AsyncRead + Send + Unpin>;
type WriteHalf = Box<dyn AsyncWrite + Send + Unpin>;

/// Outcome of reading one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    /// A line with its trailing CR/LF stripped
    Line(String),
    /// The line exceeded [`MAX_COMMAND_LINE`]; it has been discarded
    TooLong,
    /// The peer closed the connection
    Eof,
}

/// Buffered, split control connection.
pub struct ControlChannel {
    reader: BufReader<ReadHalf>,
    writer: BufWriter<WriteHalf>,
}

impl ControlChannel {
    /// Splits `stream` into the command and reply halves.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        Self::from_halves(Box::new(read), Box::new(write))
    }

    /// Builds a channel from separate halves.
    pub fn from_halves(read: ReadHalf, write: WriteHalf) -> Self {
        Self {
            reader: BufReader::new(read),
            writer: BufWriter::new(write),
        }
    }

    /// Reads the next command line.
    ///
    /// A final line without terminator is returned as a line; the next call
    /// then reports `Eof`.
    pub async fn read_line(&mut self) -> Result<ReadLine, ControlError> {
        let mut buf = Vec::new();
        let limit = MAX_COMMAND_LINE as u64;

        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;

        if n == 0 {
            return Ok(ReadLine::Eof);
        }

        if !buf.ends_with(b"\n") && n >= MAX_COMMAND_LINE {
            self.discard_rest_of_line().await?;
            return Ok(ReadLine::TooLong);
        }

        let line = String::from_utf8_lossy(&buf);
        Ok(ReadLine::Line(
            line.trim_end_matches(['\r', '\n']).to_string(),
        ))
    }

    /// Writes a reply and flushes it.
    pub async fn send(&mut self, reply: &Reply) -> Result<(), ControlError> {
        let wire = reply.to_wire();
        let writer = &mut self.writer;

        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(wire.as_bytes()).await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ControlError::Io(e.to_string())),
            Err(_) => Err(ControlError::WriteTimeout),
        }
    }

    /// Shorthand for a single-line reply.
    pub async fn reply(&mut self, code: u16, text: &str) -> Result<(), ControlError> {
        self.send(&Reply::new(code, text)).await
    }

    /// Flushes and shuts down the write half, so the peer sees end of input
    /// after the last reply.
    pub async fn shutdown(&mut self) -> Result<(), ControlError> {
        match timeout(WRITE_TIMEOUT, self.writer.shutdown()).await {
            Ok(result) => result.map_err(ControlError::from),
            Err(_) => Err(ControlError::WriteTimeout),
        }
    }

    async fn discard_rest_of_line(&mut self) -> Result<(), ControlError> {
        let mut sink = Vec::new();
        loop {
            sink.clear();
            let n = (&mut self.reader)
                .take(MAX_COMMAND_LINE as u64)
                .read_until(b'\n', &mut sink)
                .await?;
            if n == 0 || sink.ends_with(b"\n") {
                return Ok(());
            }
        }
    }
}

impl std::fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannel")
            .field("buffered", &self.reader.buffer().len())
            .finish()
    }
}
