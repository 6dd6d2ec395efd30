//! Destination file manager (§3 "Destination layout", §4.6 steps 3-4):
//! resolves `<dest_root>/<hostname>/<path-mangled>/<basename>`, decides
//! between reusing the existing file and rotating it, and performs strict
//! append-at-offset writes.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use logrelay_protocol::hashutil;
use logrelay_protocol::message::Prefix;
use logrelay_protocol::ProtocolError;

pub struct Destination {
    pub path: PathBuf,
    file: File,
}

impl Destination {
    /// Resolves the destination path, reuses or rotates the existing file
    /// based on the prefix match, and returns the destination positioned at
    /// end-of-file together with that end offset.
    pub async fn open(
        dest_root: &Path,
        hostname: &str,
        source_path: &str,
        prefix: &Prefix,
    ) -> anyhow::Result<(Self, u64)> {
        let dst_path = mangled_path(dest_root, hostname, source_path)?;
        if let Some(parent) = dst_path.parent() {
            create_dir_all_idempotent(parent).await?;
        }

        let mut file = match OpenOptions::new().read(true).write(true).open(&dst_path).await {
            Ok(mut existing) => {
                if prefix_matches(&mut existing, prefix).await? {
                    existing
                } else {
                    drop(existing);
                    rotate(&dst_path).await?;
                    create_new(&dst_path).await?
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => create_new(&dst_path).await?,
            Err(e) => return Err(e.into()),
        };

        let length = file.seek(std::io::SeekFrom::End(0)).await?;
        Ok((Self { path: dst_path, file }, length))
    }

    /// Appends `data` at `offset`, enforcing that `offset` equals the file's
    /// current length, then flushes before returning — the flush is the
    /// durability boundary the agent's acknowledgement relies on.
    pub async fn append_at(&mut self, offset: u64, data: &[u8]) -> Result<(), ProtocolError> {
        let current_length = self.file.stream_position().await?;
        if offset != current_length {
            return Err(ProtocolError::OffsetMismatch {
                expected: current_length,
                actual: offset,
            });
        }
        self.file.write_all(data).await?;
        self.file.flush().await?;
        Ok(())
    }
}

async fn create_new(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().read(true).write(true).create(true).open(path).await
}

async fn create_dir_all_idempotent(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

async fn prefix_matches(file: &mut File, prefix: &Prefix) -> std::io::Result<bool> {
    file.seek(std::io::SeekFrom::Start(0)).await?;
    let want_len = prefix.length as usize;
    let mut buf = vec![0u8; want_len];
    let mut total = 0;
    while total < want_len {
        let n = file.read(&mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    buf.truncate(total);
    if total != want_len {
        return Ok(false);
    }
    Ok(hashutil::sha1_b64(&buf) == prefix.sha1)
}

async fn rotate(dst_path: &Path) -> std::io::Result<()> {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let file_name = dst_path
        .file_name()
        .expect("destination path always has a file name")
        .to_string_lossy();
    let rotated = dst_path.with_file_name(format!("{file_name}.rotated-{timestamp}"));
    tokio::fs::rename(dst_path, rotated).await
}

/// `<dest_root>/<hostname>/<dir1~dir2~...~dirN>/<basename>` — the source
/// directory's leading separator is stripped, the rest joined by `~`.
fn mangled_path(dest_root: &Path, hostname: &str, source_path: &str) -> anyhow::Result<PathBuf> {
    let trimmed = source_path.trim_start_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("source path {source_path:?} has no basename");
    }
    let mut parts: Vec<&str> = trimmed.split('/').collect();
    let basename = parts.pop().expect("non-empty trimmed path has at least one component");

    let mut path = dest_root.join(hostname);
    if !parts.is_empty() {
        path.push(parts.join("~"));
    }
    path.push(basename);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mangles_nested_path() {
        let root = Path::new("/data/dst");
        let path = mangled_path(root, "host1", "/var/log/app/current.log").unwrap();
        assert_eq!(path, root.join("host1").join("var~log~app").join("current.log"));
    }

    #[test]
    fn mangles_top_level_path() {
        let root = Path::new("/data/dst");
        let path = mangled_path(root, "host1", "/sample.log").unwrap();
        assert_eq!(path, root.join("host1").join("sample.log"));
    }

    fn prefix_for(data: &[u8]) -> Prefix {
        Prefix {
            length: data.len() as u32,
            sha1: hashutil::sha1_b64(data),
        }
    }

    #[tokio::test]
    async fn new_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let prefix = prefix_for(b"2021-02-22 Hello world!\n");
        let (dest, length) = Destination::open(dir.path(), "host1", "/sample.log", &prefix)
            .await
            .unwrap();
        assert_eq!(length, 0);
        assert!(dest.path.starts_with(dir.path().join("host1")));
    }

    #[tokio::test]
    async fn matching_prefix_reuses_file() {
        let dir = tempdir().unwrap();
        let content = b"2021-02-22 Hello world!\n";
        let dst_path = dir.path().join("host1").join("sample.log");
        tokio::fs::create_dir_all(dst_path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&dst_path, content).await.unwrap();

        let prefix = prefix_for(content);
        let (_dest, length) = Destination::open(dir.path(), "host1", "/sample.log", &prefix)
            .await
            .unwrap();
        assert_eq!(length, content.len() as u64);
        assert!(dst_path.exists());
    }

    #[tokio::test]
    async fn mismatched_prefix_rotates_and_preserves_old_content() {
        let dir = tempdir().unwrap();
        let old_content = b"A\n";
        let dst_path = dir.path().join("host1").join("sample.log");
        tokio::fs::create_dir_all(dst_path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&dst_path, old_content).await.unwrap();

        let new_prefix = prefix_for(b"B\n");
        let (_dest, length) = Destination::open(dir.path(), "host1", "/sample.log", &new_prefix)
            .await
            .unwrap();
        assert_eq!(length, 0);

        let mut rotated = tokio::fs::read_dir(dst_path.parent().unwrap()).await.unwrap();
        let mut found_rotated = false;
        while let Some(entry) = rotated.next_entry().await.unwrap() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("sample.log.rotated-") {
                let contents = tokio::fs::read(entry.path()).await.unwrap();
                assert_eq!(contents, old_content);
                found_rotated = true;
            }
        }
        assert!(found_rotated, "expected a rotated sibling file");
    }

    #[tokio::test]
    async fn append_at_enforces_offset() {
        let dir = tempdir().unwrap();
        let prefix = prefix_for(b"hi\n");
        let (mut dest, _length) = Destination::open(dir.path(), "host1", "/sample.log", &prefix)
            .await
            .unwrap();

        dest.append_at(0, b"hi\n").await.unwrap();
        let err = dest.append_at(0, b"again\n").await.unwrap_err();
        assert!(matches!(err, ProtocolError::OffsetMismatch { .. }));

        dest.append_at(3, b"more\n").await.unwrap();
        let contents = tokio::fs::read(&dest.path).await.unwrap();
        assert_eq!(contents, b"hi\nmore\n");
    }
}
