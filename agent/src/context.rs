use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::Config;

/// Shared, read-only state handed down to every scanner/watcher/follower
/// task. The `own_log_files` set is seeded once at startup so the follower
/// can throttle tailing its own agent's log file without a process-wide
/// mutable singleton.
pub struct AgentContext {
    pub config: Config,
    pub own_log_files: HashSet<PathBuf>,
}

impl AgentContext {
    pub fn new(config: Config) -> Self {
        let mut own_log_files = HashSet::new();
        if let Some(path) = &config.log_file {
            let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            own_log_files.insert(resolved);
        }
        Self {
            config,
            own_log_files,
        }
    }
}
