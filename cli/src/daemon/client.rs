use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use gauge_protocol::{
    BatterySnapshot, DaemonRequest, DaemonResponse, DaemonStatus, EventOutcome, HistoryEntry,
    MonitorEvent, MIN_SUPPORTED_VERSION, PROTOCOL_VERSION,
};

use crate::daemon::socket_path;

#[derive(Debug, Clone)]
pub struct VersionMismatchError {
    pub client_protocol_version: u32,
    pub client_min_supported: u32,
    pub daemon_protocol_version: u32,
    pub daemon_min_supported: u32,
    pub daemon_binary_version: String,
    pub kind: VersionMismatchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMismatchKind {
    ClientTooOld,
    DaemonTooOld,
}

impl std::fmt::Display for VersionMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            VersionMismatchKind::ClientTooOld => {
                write!(
                    f,
                    "This gauge speaks monitor protocol v{}, but the running daemon (gauge {}) \
                    needs v{} or newer.\n\
                    Install a newer gauge, or run `gauge daemon stop` to handle events in-process.",
                    self.client_protocol_version,
                    self.daemon_binary_version,
                    self.daemon_min_supported
                )
            }
            VersionMismatchKind::DaemonTooOld => {
                write!(
                    f,
                    "The running daemon (gauge {}) speaks monitor protocol v{}, older than the \
                    v{} this gauge needs.\n\
                    Restart it on this binary: `gauge daemon stop && gauge daemon start`.",
                    self.daemon_binary_version,
                    self.daemon_protocol_version,
                    self.client_min_supported
                )
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("{0}")]
    VersionMismatch(VersionMismatchError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Ok when each side can read the other's messages.
pub fn check_version_compatibility(status: &DaemonStatus) -> Result<()> {
    if PROTOCOL_VERSION < status.min_supported_version {
        return Err(ClientError::VersionMismatch(VersionMismatchError {
            client_protocol_version: PROTOCOL_VERSION,
            client_min_supported: MIN_SUPPORTED_VERSION,
            daemon_protocol_version: status.protocol_version,
            daemon_min_supported: status.min_supported_version,
            daemon_binary_version: status.version.clone(),
            kind: VersionMismatchKind::ClientTooOld,
        }));
    }

    if status.protocol_version < MIN_SUPPORTED_VERSION {
        return Err(ClientError::VersionMismatch(VersionMismatchError {
            client_protocol_version: PROTOCOL_VERSION,
            client_min_supported: MIN_SUPPORTED_VERSION,
            daemon_protocol_version: status.protocol_version,
            daemon_min_supported: status.min_supported_version,
            daemon_binary_version: status.version.clone(),
            kind: VersionMismatchKind::DaemonTooOld,
        }));
    }

    Ok(())
}

pub struct DaemonClient {
    stream: UnixStream,
    read_buffer: Vec<u8>,
}

impl DaemonClient {
    pub fn connect() -> Result<Self> {
        let path = socket_path();
        let stream = UnixStream::connect(&path)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;
        Ok(Self {
            stream,
            read_buffer: Vec::with_capacity(8 * 1024),
        })
    }

    /// Connect and reject a daemon speaking an incompatible protocol.
    pub fn connect_with_version_check() -> Result<Self> {
        let mut client = Self::connect()?;
        let status = client.get_status()?;
        check_version_compatibility(&status)?;
        Ok(client)
    }

    fn read_line_blocking(&mut self) -> Result<String> {
        let mut temp_buf = [0u8; 8192];
        loop {
            if let Some(pos) = self.read_buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = self.read_buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line_bytes).to_string();
                return Ok(line);
            }
            let n = self.stream.read(&mut temp_buf)?;
            if n == 0 {
                return Err(ClientError::Protocol("Connection closed".into()));
            }
            self.read_buffer.extend_from_slice(&temp_buf[..n]);
        }
    }

    fn send_request(&mut self, request: DaemonRequest) -> Result<DaemonResponse> {
        let json = request
            .to_json()
            .map_err(|e| ClientError::Protocol(e.to_string()))?;

        writeln!(self.stream, "{}", json)?;
        self.stream.flush()?;

        let line = self.read_line_blocking()?;
        tracing::debug!(line_len = line.len(), "send_request read response");

        DaemonResponse::from_json(&line).map_err(|e| ClientError::Protocol(e.to_string()))
    }

    pub fn get_status(&mut self) -> Result<DaemonStatus> {
        match self.send_request(DaemonRequest::GetStatus)? {
            DaemonResponse::Status(status) => Ok(status),
            DaemonResponse::Error(e) => Err(ClientError::Daemon(e)),
            _ => Err(ClientError::Protocol("Unexpected response".into())),
        }
    }

    pub fn get_snapshot(&mut self) -> Result<BatterySnapshot> {
        match self.send_request(DaemonRequest::GetSnapshot)? {
            DaemonResponse::Snapshot(snapshot) => Ok(snapshot),
            DaemonResponse::Error(e) => Err(ClientError::Daemon(e)),
            _ => Err(ClientError::Protocol("Unexpected response".into())),
        }
    }

    pub fn get_history(&mut self, since: Option<i64>) -> Result<Vec<HistoryEntry>> {
        match self.send_request(DaemonRequest::GetHistory { since })? {
            DaemonResponse::History(entries) => Ok(entries),
            DaemonResponse::Error(e) => Err(ClientError::Daemon(e)),
            _ => Err(ClientError::Protocol("Unexpected response".into())),
        }
    }

    /// Push an event and wait until the daemon has handled it.
    pub fn send_event(&mut self, event: MonitorEvent) -> Result<EventOutcome> {
        match self.send_request(DaemonRequest::Event(event))? {
            DaemonResponse::Handled(outcome) => Ok(outcome),
            DaemonResponse::Error(e) => Err(ClientError::Daemon(e)),
            _ => Err(ClientError::Protocol("Unexpected response".into())),
        }
    }

    pub fn shutdown(&mut self) -> Result<()> {
        match self.send_request(DaemonRequest::Shutdown)? {
            DaemonResponse::Ok => Ok(()),
            DaemonResponse::Error(e) => Err(ClientError::Daemon(e)),
            _ => Err(ClientError::Protocol("Unexpected response".into())),
        }
    }
}
