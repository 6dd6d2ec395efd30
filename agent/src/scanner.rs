//! Periodically evaluates the configured glob patterns and spawns a watcher
//! for every newly discovered path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::context::AgentContext;
use crate::watcher;

type WatchedPathMap = HashMap<String, JoinHandle<anyhow::Result<()>>>;

pub async fn run(ctx: Arc<AgentContext>) -> anyhow::Result<()> {
    let mut watched: WatchedPathMap = HashMap::new();

    loop {
        for path in iter_matched_paths(&ctx) {
            let key = path.to_string_lossy().into_owned();

            if let Some(handle) = watched.get(&key) {
                if handle.is_finished() {
                    let handle = watched.remove(&key).expect("just checked it is present");
                    match handle.await {
                        Ok(Ok(())) => {
                            tracing::debug!(path = %key, "watcher task ended cleanly");
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(path = %key, error = %e, "watcher task failed; restarting");
                        }
                        Err(e) => {
                            tracing::warn!(path = %key, error = %e, "watcher task panicked; restarting");
                        }
                    }
                }
            }

            watched.entry(key).or_insert_with(|| {
                let ctx = ctx.clone();
                let path = path.clone();
                tokio::spawn(async move { watcher::run(ctx, path).await })
            });
        }

        tokio::time::sleep(ctx.config.scan_new_files_interval).await;
    }
}

fn iter_matched_paths(ctx: &AgentContext) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for pattern in &ctx.config.scan_globs {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "invalid glob pattern");
                continue;
            }
        };

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::debug!(error = %e, "glob entry error, skipping");
                    continue;
                }
            };

            let resolved = match std::fs::canonicalize(&path) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "could not canonicalize path, skipping");
                    continue;
                }
            };

            if is_excluded(&resolved, &ctx.config.scan_exclude_globs) {
                continue;
            }

            if seen.insert(resolved.clone()) {
                out.push(resolved);
            }
        }
    }

    out
}

fn is_excluded(path: &Path, exclude_globs: &[String]) -> bool {
    let path_str = path.to_string_lossy();
    exclude_globs.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|p| p.matches(&path_str))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_pattern_filters_matching_paths() {
        let excludes = vec!["*.tmp".to_string()];
        assert!(is_excluded(Path::new("/var/log/app.tmp"), &excludes));
        assert!(!is_excluded(Path::new("/var/log/app.log"), &excludes));
    }

    #[test]
    fn no_exclude_globs_excludes_nothing() {
        assert!(!is_excluded(Path::new("/var/log/app.log"), &[]));
    }
}
