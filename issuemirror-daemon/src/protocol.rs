//! Daemon control protocol: one JSON line each way over the Unix socket.
//!
//! ```text
//! → {"cmd":"sync","repository":"acme/widgets"}
//! ← {"reply":"synced","trigger":"socket","created":1,...}
//! → {"cmd":"sync"}
//! ← {"reply":"rejected","message":"sync error: a sync pass is already running"}
//! ```
//!
//! Requests are tagged by `cmd`, replies by `reply`. A client sends one
//! request per connection; the daemon answers every request line it reads.

use std::fmt;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// How long `status` waits for a daemon that is still binding its socket.
const STARTUP_GRACE: Duration = Duration::from_millis(500);
const POLL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// What started a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Startup,
    Interval,
    Socket,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Startup => "startup",
            Trigger::Interval => "interval",
            Trigger::Socket => "socket",
        })
    }
}

/// Outcome of one daemon-run pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub trigger: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub finished_at_unix: u64,
    pub created: usize,
    pub updated: usize,
    pub appended: usize,
    pub deleted: usize,
    pub errors: usize,
    pub summary: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub syncing: bool,
    pub started_at_unix: u64,
    pub last_sync: Option<SyncSummary>,
    pub socket: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    Status,
    /// Run a pass now, optionally limited to one `owner/name`.
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repository: Option<String>,
    },
    Stop,
}

impl DaemonRequest {
    fn name(&self) -> &'static str {
        match self {
            DaemonRequest::Status => "status",
            DaemonRequest::Sync { .. } => "sync",
            DaemonRequest::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum DaemonResponse {
    Status(DaemonStatus),
    Synced(SyncSummary),
    Stopping,
    /// The request was understood but not carried out (busy, bad scope,
    /// failed pass) or could not be parsed.
    Rejected { message: String },
}

impl DaemonResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        DaemonResponse::Rejected {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Send `request` on a fresh connection and read the reply line.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    let mut stream = UnixStream::connect(&socket).map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        }
        _ => io_err(&socket, err),
    })?;

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .map_err(|e| io_err(&socket, e))?;

    let mut reply = String::new();
    if BufReader::new(stream)
        .read_line(&mut reply)
        .map_err(|e| io_err(&socket, e))?
        == 0
    {
        return Err(DaemonError::Protocol(format!(
            "daemon hung up without answering '{}'",
            request.name()
        )));
    }
    Ok(serde_json::from_str(reply.trim_end())?)
}

/// Status of a running daemon. A daemon that is still binding its socket
/// gets [`STARTUP_GRACE`] before it is reported as not running.
pub fn request_status(home: &Path) -> Result<DaemonStatus, DaemonError> {
    let request = DaemonRequest::Status;
    let deadline = Instant::now() + STARTUP_GRACE;
    let reply = loop {
        match send_request(home, &request) {
            Err(DaemonError::DaemonNotRunning { .. }) if Instant::now() < deadline => sleep(POLL),
            other => break other?,
        }
    };
    match reply {
        DaemonResponse::Status(status) => Ok(status),
        other => Err(unexpected(&request, other)),
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    let request = DaemonRequest::Stop;
    match send_request(home, &request)? {
        DaemonResponse::Stopping => Ok(()),
        other => Err(unexpected(&request, other)),
    }
}

/// Run a pass in the daemon and wait for its summary.
pub fn request_sync(home: &Path, repository: Option<String>) -> Result<SyncSummary, DaemonError> {
    let request = DaemonRequest::Sync { repository };
    match send_request(home, &request)? {
        DaemonResponse::Synced(summary) => Ok(summary),
        other => Err(unexpected(&request, other)),
    }
}

fn unexpected(request: &DaemonRequest, reply: DaemonResponse) -> DaemonError {
    match reply {
        DaemonResponse::Rejected { message } => DaemonError::Rejected(message),
        other => DaemonError::Protocol(format!(
            "unexpected reply to '{}': {other:?}",
            request.name()
        )),
    }
}
