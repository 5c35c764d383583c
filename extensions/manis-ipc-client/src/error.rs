use manis_ipc::wire::WireError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the IPC client.
///
/// The type is `Clone` because one connection failure is delivered to every
/// call pending on that connection. I/O errors are therefore captured as
/// their kind plus message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("Unknown host name: {0}")]
    UnknownHost(String),

    /// The connect attempt kept timing out until the retry budget ran out.
    #[error("Connect to {addr} timed out after {attempts} attempt(s)")]
    ConnectTimeout { addr: SocketAddr, attempts: u32 },

    #[error("I/O error: {message}")]
    Io { kind: io::ErrorKind, message: String },

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Read from {addr} timed out after {timeout:?}")]
    ReadTimeout { addr: SocketAddr, timeout: Duration },

    #[error("Connection to {0} closed after exceeding its max idle time")]
    IdleTimeout(SocketAddr),

    #[error("Connection to {0} is closed")]
    ConnectionClosed(SocketAddr),

    /// The server reported an application-level failure for one call.
    #[error("Remote error {class}: {message}")]
    Remote { class: String, message: String },

    /// The server reported a failure and is dropping the connection.
    #[error("Fatal remote error {class}: {message}")]
    Fatal { class: String, message: String },

    #[error("The client is stopped")]
    ClientStopped,

    /// The call was dropped before anything completed it.
    #[error("RPC call aborted")]
    Aborted,
}

impl IpcError {
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            IpcError::Io { kind, .. } => *kind,
            IpcError::ConnectTimeout { .. } | IpcError::ReadTimeout { .. } => io::ErrorKind::TimedOut,
            IpcError::UnknownHost(_) => io::ErrorKind::NotFound,
            IpcError::Wire(_) => io::ErrorKind::InvalidData,
            IpcError::ConnectionClosed(_) | IpcError::IdleTimeout(_) => {
                io::ErrorKind::ConnectionAborted
            }
            _ => io::ErrorKind::Other,
        }
    }

    /// Whether the error originated on the server rather than in transport.
    pub fn is_remote(&self) -> bool {
        matches!(self, IpcError::Remote { .. } | IpcError::Fatal { .. })
    }
}

impl From<io::Error> for IpcError {
    fn from(e: io::Error) -> Self {
        IpcError::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
