use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::Config;

/// Read-only state handed to every session handler. The only resources
/// sessions share are the configuration and the filesystem (§4.5) — there is
/// no in-memory lock between sessions for the same destination file.
pub struct ServerContext {
    pub destination_directory: PathBuf,
    pub accepted_token_hashes: HashSet<String>,
}

impl ServerContext {
    pub fn new(config: &Config) -> Self {
        Self {
            destination_directory: config.destination_directory.clone(),
            accepted_token_hashes: config.accepted_token_hashes.clone(),
        }
    }
}
