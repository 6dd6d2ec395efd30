use thiserror::Error;

/// Process-scoped errors: surfaced at startup, exit the process non-zero.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("could not read configuration file {path}: {source}")]
    FileRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file {path}: {source}")]
    FileParse {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid bind address {0:?}: {1}")]
    InvalidAddress(String, logrelay_protocol::address::AddressError),
}
