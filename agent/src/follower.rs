//! Owns one open file descriptor pinned to a specific inode and streams
//! appended bytes to the server (§4.3).

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use logrelay_protocol::STREAM_CHUNK_SIZE;

use crate::client::ClientSession;
use crate::context::AgentContext;

const FOLLOWER_RESTART_BACKOFF: Duration = Duration::from_secs(10);
const SELF_LOG_THROTTLE: Duration = Duration::from_secs(60);

enum SessionOutcome {
    RotatedAndIdle,
}

pub async fn run(
    ctx: Arc<AgentContext>,
    path: PathBuf,
    mut file: File,
    file_inode: u64,
    current_inode: Arc<AtomicU64>,
) -> anyhow::Result<()> {
    loop {
        match run_session(&ctx, &path, &mut file, file_inode, &current_inode).await {
            Ok(SessionOutcome::RotatedAndIdle) => return Ok(()),
            Err(e) => {
                tracing::warn!(path = %path.display(), fd_inode = file_inode, error = %e, "follower session failed");
                tokio::time::sleep(FOLLOWER_RESTART_BACKOFF).await;
                tracing::info!(path = %path.display(), fd_inode = file_inode, "retrying to follow file");
            }
        }
    }
}

fn rotated_and_idle(
    file_inode: u64,
    current_inode: &AtomicU64,
    last_data_ts: Instant,
    threshold: Duration,
) -> bool {
    current_inode.load(Ordering::SeqCst) != file_inode && last_data_ts.elapsed() > threshold
}

async fn read_some(file: &mut File, max_len: usize) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![0u8; max_len];
    let n = file.read(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
}

async fn run_session(
    ctx: &AgentContext,
    path: &PathBuf,
    file: &mut File,
    file_inode: u64,
    current_inode: &Arc<AtomicU64>,
) -> anyhow::Result<SessionOutcome> {
    let mut last_data_ts = Instant::now();

    // Phase 1: prefix acquisition.
    let prefix = loop {
        file.seek(std::io::SeekFrom::Start(0)).await?;
        let prefix = read_some(file, ctx.config.prefix_length).await?;
        if prefix.len() < ctx.config.min_prefix_length {
            tracing::debug!(
                path = %path.display(),
                len = prefix.len(),
                "file is too small"
            );
            if rotated_and_idle(
                file_inode,
                current_inode,
                last_data_ts,
                ctx.config.rotated_files_inactivity_threshold,
            ) {
                tracing::debug!(path = %path.display(), fd_inode = file_inode, "rotated file was inactive, closing");
                return Ok(SessionOutcome::RotatedAndIdle);
            }
            tokio::time::sleep(ctx.config.tail_read_interval).await;
            continue;
        }
        last_data_ts = Instant::now();
        break prefix;
    };

    // Phase 2: session open.
    tracing::debug!(path = %path.display(), fd_inode = file_inode, "connecting to server");
    let mut session = ClientSession::connect(ctx, path, &prefix).await?;

    // Phase 3: resume.
    file.seek(std::io::SeekFrom::Start(session.server_length))
        .await?;
    let pos = file.stream_position().await?;
    if pos != session.server_length {
        anyhow::bail!(
            "failed to seek {} to {} - got to {}",
            path.display(),
            session.server_length,
            pos
        );
    }
    tracing::debug!(path = %path.display(), fd_inode = file_inode, offset = pos, "resumed");

    // Phase 4-6: stream.
    loop {
        let pos = file.stream_position().await?;
        let chunk = read_some(file, STREAM_CHUNK_SIZE).await?;
        if chunk.is_empty() {
            if rotated_and_idle(
                file_inode,
                current_inode,
                last_data_ts,
                ctx.config.rotated_files_inactivity_threshold,
            ) {
                tracing::debug!(path = %path.display(), fd_inode = file_inode, "rotated file was inactive, closing");
                return Ok(SessionOutcome::RotatedAndIdle);
            }
            tokio::time::sleep(ctx.config.tail_read_interval).await;
            continue;
        }

        last_data_ts = Instant::now();
        tracing::debug!(path = %path.display(), offset = pos, len = chunk.len(), "read bytes");
        session.send_data(pos, chunk).await?;

        if ctx.own_log_files.contains(path) {
            tokio::time::sleep(SELF_LOG_THROTTLE).await;
        }
    }
}
