use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use logrelay_protocol::DEFAULT_SERVER_PORT;

use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "logrelay-server", about = "Accepts agent connections and appends received bytes to per-source files")]
pub struct Cli {
    #[arg(long)]
    pub conf: Option<PathBuf>,

    #[arg(long)]
    pub log: Option<PathBuf>,

    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// `host:port`, `:port`, or `port`. Defaults to `:5645`.
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory to store the received logs.
    #[arg(long)]
    pub dest: Option<PathBuf>,

    #[arg(long = "tls-cert")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long = "tls-key")]
    pub tls_key: Option<PathBuf>,

    #[arg(long = "tls-key-password-file")]
    pub tls_key_password_file: Option<PathBuf>,

    /// Hex SHA-1 of an accepted client token (repeatable).
    #[arg(long = "client-token-hash")]
    pub client_token_hash: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind: Option<String>,
    dest: Option<PathBuf>,
    log: Option<PathBuf>,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
    tls_key_password_file: Option<PathBuf>,
    client_token_hash: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_host: String,
    pub bind_port: u16,
    pub destination_directory: PathBuf,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
    pub tls_key_password: Option<String>,
    pub tls: bool,
    pub accepted_token_hashes: HashSet<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let cli = Cli::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let conf_path = cli
            .conf
            .clone()
            .or_else(|| std::env::var("CONF").ok().map(PathBuf::from));

        let file_cfg = match &conf_path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                serde_yaml::from_str(&content).map_err(|source| ConfigError::FileParse {
                    path: path.clone(),
                    source,
                })?
            }
            None => FileConfig::default(),
        };

        let bind = cli.bind.or(file_cfg.bind).unwrap_or_else(|| format!(":{DEFAULT_SERVER_PORT}"));
        let (bind_host, bind_port) = logrelay_protocol::address::parse_address(&bind)
            .map_err(|e| ConfigError::InvalidAddress(bind.clone(), e))?;

        let destination_directory = cli
            .dest
            .or(file_cfg.dest)
            .ok_or(ConfigError::Missing("--dest"))?;

        let tls_cert_file = cli.tls_cert.or(file_cfg.tls_cert);
        let tls_key_file = cli.tls_key.or(file_cfg.tls_key);

        let tls_key_password = match cli.tls_key_password_file.or(file_cfg.tls_key_password_file) {
            Some(path) => Some(
                std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::FileRead { path, source })?
                    .trim()
                    .to_string(),
            ),
            None => std::env::var("TLS_KEY_PASSWORD").ok(),
        };

        let mut accepted_token_hashes: HashSet<String> = cli
            .client_token_hash
            .into_iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        if accepted_token_hashes.is_empty() {
            if let Some(hashes) = file_cfg.client_token_hash {
                accepted_token_hashes = hashes.into_iter().map(|h| h.to_ascii_lowercase()).collect();
            }
        }

        let log_file = cli.log.or(file_cfg.log);
        let tls = tls_cert_file.is_some();

        Ok(Config {
            bind_host,
            bind_port,
            destination_directory,
            log_file,
            verbose: cli.verbose,
            tls_cert_file,
            tls_key_file,
            tls_key_password,
            tls,
            accepted_token_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(dest: Option<&str>, bind: Option<&str>) -> Cli {
        Cli {
            conf: None,
            log: None,
            verbose: false,
            bind: bind.map(String::from),
            dest: dest.map(PathBuf::from),
            tls_cert: None,
            tls_key: None,
            tls_key_password_file: None,
            client_token_hash: vec![],
        }
    }

    #[test]
    fn requires_destination_directory() {
        let err = Config::from_cli(cli(None, None)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("--dest")));
    }

    #[test]
    fn defaults_bind_to_5645() {
        let cfg = Config::from_cli(cli(Some("/tmp/dst"), None)).unwrap();
        assert_eq!(cfg.bind_host, "");
        assert_eq!(cfg.bind_port, 5645);
    }

    #[test]
    fn parses_explicit_bind() {
        let cfg = Config::from_cli(cli(Some("/tmp/dst"), Some("0.0.0.0:9000"))).unwrap();
        assert_eq!(cfg.bind_host, "0.0.0.0");
        assert_eq!(cfg.bind_port, 9000);
    }
}
