//! Async driver for the MKS Robin Wi-Fi module (Marlin 2.x).
//!
//! Speaks the module's line-oriented text protocol over one raw TCP socket
//! (default port 8080). Replies are two-stage: most commands answer with a
//! bare `ok` line followed by an optional payload line, some skip the `ok`,
//! and errors are signalled by a line starting with `error` rather than by
//! any status code. The reply is not self-delimiting, so the reader
//! classifies the first line and only then decides whether a second read is
//! worth waiting for.
//!
//! One driver owns one connection, and the protocol has no request IDs, so
//! at most one exchange may be in flight per driver. The driver itself takes
//! `&mut self` everywhere and performs no locking; serializing access to a
//! shared instance is the owner's job (see `web::printer_channel`).

mod command;
mod telemetry;

pub use command::Command;
pub use telemetry::{Snapshot, Temperatures};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// Firmware limit on the length of a streamed G-code line.
const MAX_LINE_LEN: usize = 127;

/// The bare acknowledgement line preceding most payloads.
const ACK: &str = "ok";

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("connection to {0} failed: {1}")]
    Connect(String, #[source] std::io::Error),
    #[error("not connected")]
    NotConnected,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("printer error: {0}")]
    Protocol(String),
    #[error("timed out waiting for printer reply")]
    Timeout,
    #[error("file not found: {0}")]
    NotFound(PathBuf),
}

/// Outcome of one two-stage reply read. Device-signalled errors never reach
/// this enum; they surface as [`DriverError::Protocol`].
#[derive(Debug, PartialEq, Eq)]
enum Reply {
    /// A payload line, with or without a leading `ok`.
    Payload(String),
    /// Acknowledged with no further data.
    Empty,
    /// Nothing arrived before the read timeout.
    TimedOut,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// One logical connection to one printer.
pub struct Driver {
    host: String,
    port: u16,
    read_timeout: Duration,
    conn: Option<Connection>,
    latest: Option<Snapshot>,
}

impl Driver {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_timeout(host, port, DEFAULT_READ_TIMEOUT)
    }

    pub fn with_timeout(host: impl Into<String>, port: u16, read_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout,
            conn: None,
            latest: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// The most recent non-empty snapshot assembled by [`Driver::poll`].
    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    /// Open the TCP connection. Any stale handle is dropped first, so
    /// calling this on an already-open driver redials.
    pub async fn connect(&mut self) -> Result<(), DriverError> {
        self.conn = None;
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| DriverError::Connect(format!("{}:{}", self.host, self.port), e))?;
        let (read_half, write_half) = stream.into_split();
        self.conn = Some(Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
        });
        tracing::debug!("connected to {}:{}", self.host, self.port);
        Ok(())
    }

    /// Close the connection. A no-op when already closed.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!("connection to {}:{} closed", self.host, self.port);
        }
    }

    /// Retarget the driver at another printer and reconnect.
    ///
    /// The caller must make sure no exchange is in flight; behind the
    /// request channel that holds by construction.
    pub async fn rebind(&mut self, host: impl Into<String>, port: u16) -> Result<(), DriverError> {
        self.close();
        self.host = host.into();
        self.port = port;
        self.connect().await
    }

    async fn write_line(&mut self, text: &str) -> Result<(), DriverError> {
        let conn = self.conn.as_mut().ok_or(DriverError::NotConnected)?;
        tracing::debug!(">> {}", text);
        conn.writer.write_all(format!("{text}\r\n").as_bytes()).await?;
        Ok(())
    }

    /// Read one line, bounded by the read timeout. `None` means timeout.
    async fn read_line(&mut self) -> Result<Option<String>, DriverError> {
        let conn = self.conn.as_mut().ok_or(DriverError::NotConnected)?;
        let mut raw = String::new();
        match timeout(self.read_timeout, conn.reader.read_line(&mut raw)).await {
            Ok(Ok(0)) => Err(DriverError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed by printer",
            ))),
            Ok(Ok(_)) => {
                let text = raw.trim().to_string();
                tracing::debug!("<< {}", text);
                Ok(Some(text))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }

    /// First line, classify, conditionally read the second line.
    async fn read_reply(&mut self) -> Result<Reply, DriverError> {
        let first = match self.read_line().await? {
            Some(line) => line,
            None => return Ok(Reply::TimedOut),
        };
        if first.to_ascii_lowercase().starts_with("error") {
            return Err(DriverError::Protocol(first));
        }
        if first == ACK {
            // The ack usually precedes one payload line; commands that
            // acknowledge with no data let the second read time out.
            return Ok(match self.read_line().await? {
                Some(second) if !second.is_empty() && second != ACK => Reply::Payload(second),
                _ => Reply::Empty,
            });
        }
        // Some replies skip the leading ack entirely.
        Ok(Reply::Payload(first))
    }

    /// Send a command and return its payload line, empty if none.
    ///
    /// A timeout waiting for the first reply line is logged and surfaces as
    /// an empty payload; a silent printer and one with nothing to say are
    /// indistinguishable here. Device-signalled errors come back as
    /// [`DriverError::Protocol`] carrying the raw line.
    pub async fn send(&mut self, command: &Command) -> Result<String, DriverError> {
        self.write_line(&command.wire()).await?;
        match self.read_reply().await? {
            Reply::Payload(line) => Ok(line),
            Reply::Empty => Ok(String::new()),
            Reply::TimedOut => {
                tracing::warn!("timeout waiting for reply to {}", command);
                Ok(String::new())
            }
        }
    }

    /// Like [`Driver::send`], but a first-line timeout is an error.
    ///
    /// Used for state-changing commands, where silence is ambiguous and the
    /// caller needs to know the printer never acknowledged.
    pub async fn send_strict(&mut self, command: &Command) -> Result<String, DriverError> {
        self.write_line(&command.wire()).await?;
        match self.read_reply().await? {
            Reply::Payload(line) => Ok(line),
            Reply::Empty => Ok(String::new()),
            Reply::TimedOut => Err(DriverError::Timeout),
        }
    }

    /// Query temperatures, progress, elapsed time and machine state.
    ///
    /// The four queries run back to back; a field that fails to parse is
    /// simply absent from the result. A non-empty snapshot is timestamped
    /// and retained as [`Driver::latest`]; an all-miss round returns an
    /// empty snapshot and leaves `latest` untouched, so callers wanting
    /// best-available data can fall back to it.
    ///
    /// `pace` is an optional delay applied after the queries, for callers
    /// that want to rate-limit how hard the module is hammered. It blocks
    /// the calling task for its full duration.
    pub async fn poll(&mut self, pace: Option<Duration>) -> Result<Snapshot, DriverError> {
        let fresh = Snapshot {
            temps: telemetry::parse_temps(&self.send(&Command::TempQuery).await?),
            progress: telemetry::parse_progress(&self.send(&Command::Progress).await?),
            elapsed: telemetry::parse_elapsed(&self.send(&Command::Elapsed).await?),
            state: telemetry::parse_state(&self.send(&Command::State).await?),
            stamp: None,
        };
        let fresh = if fresh.is_empty() {
            fresh
        } else {
            let fresh = Snapshot {
                stamp: Some(Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
                ..fresh
            };
            self.latest = Some(fresh.clone());
            fresh
        };
        if let Some(delay) = pace {
            tokio::time::sleep(delay).await;
        }
        Ok(fresh)
    }

    /// Stream a local G-code file to the printer's storage via M28/M29.
    ///
    /// The file is read line by line, never loaded wholesale; each line is
    /// clipped to the firmware's 127-character limit and sent as its own
    /// exchange, because the per-line ack is the only flow control the
    /// module has. The first error reply aborts the transfer. M29 goes out
    /// exactly once on every exit path, success or not, so the module never
    /// ends up with a file left open for write.
    pub async fn upload(&mut self, path: &Path) -> Result<(), DriverError> {
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(DriverError::NotFound(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DriverError::NotFound(path.to_path_buf()))?
            .to_string();

        // An error reply here aborts the whole operation before any data.
        self.send(&Command::BeginWrite { name }).await?;

        let streamed = self.stream_file(path).await;
        let closed = self.send(&Command::EndWrite).await;
        streamed?;
        closed?;
        Ok(())
    }

    async fn stream_file(&mut self, path: &Path) -> Result<(), DriverError> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await? {
            self.write_line(clip_line(line.trim_end())).await?;
            // Protocol errors abort the transfer; a timed-out ack does not.
            self.read_reply().await?;
        }
        Ok(())
    }

    /// Select `filename` on the active storage and begin (or resume)
    /// printing it: `M23 <filename>` then `M24`, in that fixed order.
    ///
    /// If M24 fails after M23 succeeded the file stays selected; the
    /// firmware offers no deselect, so there is nothing to roll back.
    pub async fn start_print(&mut self, filename: &str) -> Result<(), DriverError> {
        self.send_strict(&Command::Select { name: filename.to_string() }).await?;
        self.send_strict(&Command::Start).await?;
        Ok(())
    }

    /// Pause the current print. The firmware treats this as a no-op when
    /// nothing is printing.
    pub async fn pause(&mut self) -> Result<(), DriverError> {
        self.send_strict(&Command::Pause).await?;
        Ok(())
    }

    /// Resume a paused print.
    pub async fn resume(&mut self) -> Result<(), DriverError> {
        self.send_strict(&Command::Start).await?;
        Ok(())
    }

    /// Abort the current print. What the machine does next (motion stop,
    /// heater shutdown) is firmware policy, not ours.
    pub async fn abort(&mut self) -> Result<(), DriverError> {
        self.send_strict(&Command::Abort).await?;
        Ok(())
    }

    /// Toggle between SD and USB storage.
    pub async fn switch_storage(&mut self) -> Result<(), DriverError> {
        self.send_strict(&Command::SwitchStorage).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("read_timeout", &self.read_timeout)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

/// Clip a line to the firmware limit without splitting a code point.
fn clip_line(line: &str) -> &str {
    match line.char_indices().nth(MAX_LINE_LEN) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
