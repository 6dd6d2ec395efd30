use thiserror::Error;

/// Errors that are fatal to a single session (agent<->server connection),
/// never to the owning process.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed frame header: {0:?}")]
    MalformedFrame(String),

    #[error("unexpected command: {0:?}")]
    UnexpectedCommand(String),

    #[error("unexpected reply status: {0:?}")]
    UnexpectedStatus(String),

    #[error("unsupported compression codec: {0:?}")]
    UnsupportedCompression(String),

    #[error("offset mismatch: expected {expected}, server is at {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("server replied with error: {0}")]
    ServerError(String),

    #[error("peer closed the connection")]
    ConnectionClosed,

    #[error("operation timed out")]
    Timeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("field did not parse as an integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}
