use manis_ipc_client::IpcError;
use thiserror::Error;

/// The single error type surfaced by invokers and the proxy registry.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller broke the invocation contract: wrong arity, a missing
    /// argument, or a proxy that cannot be closed.
    #[error("{0}")]
    Usage(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Remote call failed: {0}")]
    Ipc(#[from] IpcError),

    #[error("Failed to encode or decode call payload: {0}")]
    Codec(String),
}

impl ServiceError {
    pub fn is_usage(&self) -> bool {
        matches!(self, ServiceError::Usage(_))
    }
}

impl From<prost::DecodeError> for ServiceError {
    fn from(e: prost::DecodeError) -> Self {
        ServiceError::Codec(e.to_string())
    }
}

impl From<bitcode::Error> for ServiceError {
    fn from(e: bitcode::Error) -> Self {
        ServiceError::Codec(e.to_string())
    }
}
