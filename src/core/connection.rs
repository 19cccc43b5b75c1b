use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::config::Config;

/// Per-operation deadlines, snapshotted from the configuration at dial time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Timeouts {
    pub fn from_config(config: &Config) -> Self {
        let ms = |v: u64| (v > 0).then(|| Duration::from_millis(v));
        Self {
            connect: ms(config.connect_timeout_ms),
            read: ms(config.read_timeout_ms),
            write: ms(config.write_timeout_ms),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,
    #[error("{op} timed out after {limit:?}")]
    Timeout { op: &'static str, limit: Duration },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One buffered duplex connection to a memcached backend.
///
/// Owned exclusively by whichever holder currently has it: a pool free-list
/// or the caller that checked it out. Operations are strictly sequential
/// (`&mut self`); there is no pipelining or multiplexing. Every operation
/// checks the closed flag at entry and fails with `ConnectionError::Closed`
/// after `close()` rather than faulting.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    server_index: usize,
    timeouts: Timeouts,
    closed: bool,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, server_index: usize, timeouts: Timeouts) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            server_index,
            timeouts,
            closed: false,
        }
    }

    /// Index of the backend this connection was dialed against.
    pub fn server_index(&self) -> usize {
        self.server_index
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), ConnectionError> {
        if self.closed {
            Err(ConnectionError::Closed)
        } else {
            Ok(())
        }
    }

    /// Write `buf` and flush, bounded by the configured write deadline.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, ConnectionError> {
        self.ensure_open()?;
        let deadline = self.timeouts.write;
        let writer = &mut self.writer;
        with_deadline(deadline, "write", async move {
            writer.write_all(buf).await?;
            writer.flush().await?;
            Ok(buf.len())
        })
        .await
    }

    /// Read into `buf`, bounded by the configured read deadline.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError> {
        self.ensure_open()?;
        let deadline = self.timeouts.read;
        with_deadline(deadline, "read", self.reader.read(buf)).await
    }

    /// Read up to and including `delim`, bounded by the configured read
    /// deadline. EOF before the delimiter is an error.
    pub async fn read_line(&mut self, delim: u8) -> Result<Vec<u8>, ConnectionError> {
        self.ensure_open()?;
        let deadline = self.timeouts.read;
        let reader = &mut self.reader;
        with_deadline(deadline, "read", async move {
            let mut line = Vec::new();
            let n = reader.read_until(delim, &mut line).await?;
            if n == 0 || line.last() != Some(&delim) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before delimiter",
                ));
            }
            Ok(line)
        })
        .await
    }

    /// Read a single byte, bounded by the configured read deadline.
    pub async fn read_byte(&mut self) -> Result<u8, ConnectionError> {
        self.ensure_open()?;
        let deadline = self.timeouts.read;
        with_deadline(deadline, "read", self.reader.read_u8()).await
    }

    /// Close the socket and mark the connection closed. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // The peer may already be gone.
        let _ = self.writer.shutdown().await;
    }

    /// Liveness probe: one `version` round trip. True only when both the
    /// write and the response line succeed.
    pub async fn is_healthy(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.write(b"version\r\n").await.is_err() {
            return false;
        }
        self.read_line(b'\n').await.is_ok()
    }
}

async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    op: &'static str,
    fut: F,
) -> Result<T, ConnectionError>
where
    F: Future<Output = Result<T, std::io::Error>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(ConnectionError::Io),
            Err(_) => Err(ConnectionError::Timeout { op, limit }),
        },
        None => fut.await.map_err(ConnectionError::Io),
    }
}
