//! Wire protocol shared by `logrelay-agent` and `logrelay-server`: frame
//! codec, message shapes, compression dispatch, address parsing, and the
//! small hashing/secret-handling helpers both binaries need.

pub mod address;
pub mod compression;
pub mod error;
pub mod frame;
pub mod hashutil;
pub mod message;
pub mod secret;

pub use error::ProtocolError;
pub use message::{
    Auth, Compression as CompressionKind, DataMeta, ErrorPayload, Header, LengthPayload, Prefix,
    DATA_COMMAND, HEADER_COMMAND, STATUS_ERROR, STATUS_OK,
};

/// Default per-operation network deadline (§4.4 / §5).
pub const DEFAULT_FRAME_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Default content-prefix length used for rotation identity (§4.3 / glossary).
pub const DEFAULT_PREFIX_LENGTH: usize = 50;

/// Minimum prefix length below which a file is considered "too small" (§4.3).
pub const DEFAULT_MIN_PREFIX_LENGTH: usize = 20;

/// Default agent poll interval while waiting for new bytes or a path change.
pub const DEFAULT_TAIL_READ_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Default scanner cadence for re-evaluating glob patterns.
pub const DEFAULT_SCAN_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Default inactivity threshold before a rotated-and-idle follower exits (§4.3).
pub const DEFAULT_ROTATED_INACTIVITY_THRESHOLD: std::time::Duration =
    std::time::Duration::from_secs(600);

/// Default server bind port (§4.5).
pub const DEFAULT_SERVER_PORT: u16 = 5645;

/// Streaming read chunk size (§4.3 phase 4).
pub const STREAM_CHUNK_SIZE: usize = 1 << 20;
