use std::net::SocketAddrV4;
use thiserror::Error;

/// Failure of a single request/response exchange with one device.
///
/// Every variant is non-fatal: callers turn them into record status fields
/// rather than propagating them up to the scan cycle.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("connection refused by {0}")]
    ConnectRefused(SocketAddrV4),

    #[error("connection to {0} timed out")]
    ConnectTimeout(SocketAddrV4),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out reading response from {0}")]
    ReadTimeout(SocketAddrV4),

    #[error("IO error talking to {addr}: {source}")]
    Io {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed response from {addr}: {reason}")]
    MalformedResponse { addr: SocketAddrV4, reason: String },

    #[error("device rejected command (code {code}): {message}")]
    CommandRejected { code: i64, message: String },
}

impl RpcError {
    /// True for the failures that mean nothing answered at the address.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectRefused(_) | RpcError::ConnectTimeout(_) | RpcError::Connect { .. }
        )
    }

    /// Short stable label, used for logging and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::ConnectRefused(_) => "connect_refused",
            RpcError::ConnectTimeout(_) => "connect_timeout",
            RpcError::Connect { .. } => "connect_failed",
            RpcError::ReadTimeout(_) => "read_timeout",
            RpcError::Io { .. } => "io",
            RpcError::MalformedResponse { .. } => "malformed_response",
            RpcError::CommandRejected { .. } => "command_rejected",
        }
    }
}

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("Invalid subnet descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sink '{sink}' delivery failed: {reason}")]
    SinkDelivery { sink: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Device RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScannerError>;
