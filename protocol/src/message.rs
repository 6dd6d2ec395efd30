use serde::{Deserialize, Serialize};

/// `logline-agent-v1` header command — sent exactly once, as the first
/// command on a session.
pub const HEADER_COMMAND: &str = "logline-agent-v1";

/// `data` command — sent repeatedly after the header is acknowledged.
pub const DATA_COMMAND: &str = "data";

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// First `length` bytes of a source file, identified by length and SHA-1,
/// used to detect rotation independently of the filename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prefix {
    pub length: u32,
    pub sha1: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auth {
    pub client_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub hostname: String,
    pub path: String,
    pub prefix: Prefix,
    pub auth: Auth,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    Lzma,
    Zst,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Lzma => "lzma",
            Compression::Zst => "zst",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataMeta {
    pub offset: u64,
    pub compression: Option<Compression>,
}

/// The sole `ok` payload currently defined for the header reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LengthPayload {
    pub length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}
