//! Per-path state machine (§4.2): detects inode changes and binds a
//! follower to each newly opened file descriptor.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::context::AgentContext;
use crate::follower;

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> u64 {
    0
}

pub async fn run(ctx: Arc<AgentContext>, path: PathBuf) -> anyhow::Result<()> {
    let mut last_inode: Option<u64> = None;
    let mut last_stat_error: Option<String> = None;
    let mut last_follower: Option<JoinHandle<anyhow::Result<()>>> = None;
    // Shared with every follower spawned for this path so a follower bound
    // to a now-rotated inode can tell it has been superseded.
    let current_inode = Arc::new(AtomicU64::new(0));

    loop {
        if let Some(handle) = &last_follower {
            if handle.is_finished() {
                let handle = last_follower.take().expect("just checked it is present");
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        return Err(e.context(format!(
                            "follower for {} is not running",
                            path.display()
                        )))
                    }
                    Err(e) => {
                        anyhow::bail!("follower task for {} panicked: {e}", path.display())
                    }
                }
            }
        }

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                let repr = format!("{e:?}");
                if last_stat_error.as_deref() != Some(repr.as_str()) {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        tracing::info!(path = %path.display(), "file not found");
                    } else {
                        tracing::info!(path = %path.display(), error = %e, "could not stat path");
                    }
                    last_stat_error = Some(repr);
                }
                tokio::time::sleep(ctx.config.tail_read_interval).await;
                continue;
            }
        };
        last_stat_error = None;

        let observed_inode = inode_of(&metadata);
        if Some(observed_inode) == last_inode {
            tokio::time::sleep(ctx.config.tail_read_interval).await;
            continue;
        }

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::info!(path = %path.display(), error = %e, "could not open path");
                tokio::time::sleep(ctx.config.tail_read_interval).await;
                continue;
            }
        };
        let f_inode = inode_of(&file.metadata().await?);
        if Some(f_inode) == last_inode {
            // Race: stat() observed a new inode but by the time we opened the
            // path, it pointed at the previously followed file again.
            tracing::warn!(path = %path.display(), "opened the same inode as before despite an inode change; retrying");
            continue;
        }

        if last_inode.is_none() {
            tracing::info!(path = %path.display(), inode = f_inode, "discovered file");
        } else {
            tracing::info!(
                path = %path.display(),
                old_inode = ?last_inode,
                new_inode = f_inode,
                "file rotated"
            );
        }
        last_inode = Some(f_inode);
        current_inode.store(f_inode, Ordering::SeqCst);

        let handle = tokio::spawn(follower::run(
            ctx.clone(),
            path.clone(),
            file,
            f_inode,
            current_inode.clone(),
        ));
        last_follower = Some(handle);
    }
}
