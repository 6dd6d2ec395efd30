use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use logrelay_protocol::{
    DEFAULT_MIN_PREFIX_LENGTH, DEFAULT_PREFIX_LENGTH, DEFAULT_ROTATED_INACTIVITY_THRESHOLD,
    DEFAULT_SCAN_INTERVAL, DEFAULT_TAIL_READ_INTERVAL,
};

use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "logrelay-agent", about = "Tails log files and ships appended bytes to a logrelay-server")]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long)]
    pub conf: Option<PathBuf>,

    /// Path to this agent's own log file.
    #[arg(long)]
    pub log: Option<PathBuf>,

    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Glob pattern to scan (repeatable).
    #[arg(long = "scan")]
    pub scan: Vec<String>,

    /// Glob pattern that excludes otherwise-matched paths (repeatable).
    #[arg(long = "scan-exclude")]
    pub scan_exclude: Vec<String>,

    /// Server address as `host:port`, `:port`, or `port`.
    #[arg(long)]
    pub server: Option<String>,

    #[arg(long)]
    pub tls: bool,

    /// Path to the server's certificate, in PEM format, for TLS verification.
    #[arg(long = "tls-cert")]
    pub tls_cert: Option<PathBuf>,

    /// Path to a file containing the client authentication token.
    #[arg(long = "token-file")]
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    scan: Option<Vec<String>>,
    scan_exclude: Option<Vec<String>>,
    server: Option<String>,
    tls: Option<bool>,
    tls_cert: Option<PathBuf>,
    token_file: Option<PathBuf>,
    log: Option<PathBuf>,
    scan_new_files_interval: Option<f64>,
    tail_read_interval: Option<f64>,
    rotated_files_inactivity_threshold: Option<f64>,
    prefix_length: Option<usize>,
    min_prefix_length: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scan_globs: Vec<String>,
    pub scan_exclude_globs: Vec<String>,
    pub server_host: String,
    pub server_port: u16,
    pub tls: bool,
    pub tls_cert: Option<PathBuf>,
    pub client_token: String,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
    pub scan_new_files_interval: Duration,
    pub tail_read_interval: Duration,
    pub rotated_files_inactivity_threshold: Duration,
    pub prefix_length: usize,
    pub min_prefix_length: usize,
}

impl Config {
    /// Parses CLI flags, layers an optional YAML file under them, and falls
    /// back to `CLIENT_TOKEN`/`CONF` environment variables last.
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

        let scan_globs = if !cli.scan.is_empty() {
            cli.scan
        } else {
            file_cfg.scan.unwrap_or_default()
        };
        if scan_globs.is_empty() {
            return Err(ConfigError::Missing("--scan"));
        }

        let scan_exclude_globs = if !cli.scan_exclude.is_empty() {
            cli.scan_exclude
        } else {
            file_cfg.scan_exclude.unwrap_or_default()
        };

        let server = cli
            .server
            .or(file_cfg.server)
            .ok_or(ConfigError::Missing("--server"))?;
        let (server_host, server_port) = logrelay_protocol::address::parse_address(&server)
            .map_err(|e| ConfigError::InvalidAddress(server.clone(), e))?;

        let tls = cli.tls || file_cfg.tls.unwrap_or(false);
        let tls_cert = cli.tls_cert.or(file_cfg.tls_cert);

        let client_token = match cli.token_file.or(file_cfg.token_file) {
            Some(path) => std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::FileRead { path, source })?
                .trim()
                .to_string(),
            None => std::env::var("CLIENT_TOKEN").map_err(|_| ConfigError::Missing("CLIENT_TOKEN"))?,
        };

        let log_file = cli.log.or(file_cfg.log);

        Ok(Config {
            scan_globs,
            scan_exclude_globs,
            server_host,
            server_port,
            tls,
            tls_cert,
            client_token,
            log_file,
            verbose: cli.verbose,
            scan_new_files_interval: file_cfg
                .scan_new_files_interval
                .map(Duration::from_secs_f64)
                .unwrap_or(DEFAULT_SCAN_INTERVAL),
            tail_read_interval: file_cfg
                .tail_read_interval
                .map(Duration::from_secs_f64)
                .unwrap_or(DEFAULT_TAIL_READ_INTERVAL),
            rotated_files_inactivity_threshold: file_cfg
                .rotated_files_inactivity_threshold
                .map(Duration::from_secs_f64)
                .unwrap_or(DEFAULT_ROTATED_INACTIVITY_THRESHOLD),
            prefix_length: file_cfg.prefix_length.unwrap_or(DEFAULT_PREFIX_LENGTH),
            min_prefix_length: file_cfg
                .min_prefix_length
                .unwrap_or(DEFAULT_MIN_PREFIX_LENGTH),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(scan: Vec<&str>, server: Option<&str>) -> Cli {
        Cli {
            conf: None,
            log: None,
            verbose: false,
            scan: scan.into_iter().map(String::from).collect(),
            scan_exclude: vec![],
            server: server.map(String::from),
            tls: false,
            tls_cert: None,
            token_file: None,
        }
    }

    #[test]
    fn requires_at_least_one_scan_glob() {
        std::env::set_var("CLIENT_TOKEN", "t");
        let err = Config::from_cli(cli(vec![], Some("h:1"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("--scan")));
    }

    #[test]
    fn requires_server_address() {
        std::env::set_var("CLIENT_TOKEN", "t");
        let err = Config::from_cli(cli(vec!["*.log"], None)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("--server")));
    }

    #[test]
    fn parses_minimal_config() {
        std::env::set_var("CLIENT_TOKEN", "topsecret");
        let cfg = Config::from_cli(cli(vec!["/var/log/*.log"], Some("h:5645"))).unwrap();
        assert_eq!(cfg.server_host, "h");
        assert_eq!(cfg.server_port, 5645);
        assert_eq!(cfg.client_token, "topsecret");
        assert_eq!(cfg.prefix_length, DEFAULT_PREFIX_LENGTH);
    }
}
