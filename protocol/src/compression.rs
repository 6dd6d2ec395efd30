//! Compression is treated as a byte-to-byte function per codec; the codecs
//! themselves are just `flate2`/`xz2`/`zstd` calls dispatched to a worker
//! thread so they never block the I/O scheduler.

use std::io::{Read, Write};

use crate::error::ProtocolError;
use crate::message::Compression;

/// gzip-compress a chunk on a worker thread. Used by the follower to decide,
/// per chunk, whether shipping compressed bytes is worth it.
pub async fn compress_gzip(data: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
    tokio::task::spawn_blocking(move || {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&data)?;
        encoder.finish()
    })
    .await
    .expect("compression worker panicked")
    .map_err(ProtocolError::Io)
}

pub async fn decompress(data: Vec<u8>, codec: Compression) -> Result<Vec<u8>, ProtocolError> {
    tokio::task::spawn_blocking(move || match codec {
        Compression::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(&data[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Lzma => {
            let mut decoder = xz2::read::XzDecoder::new(&data[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Zst => zstd::stream::decode_all(&data[..]),
    })
    .await
    .expect("decompression worker panicked")
    .map_err(ProtocolError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gzip_round_trips() {
        let payload = b"2021-02-22 Hello world!\n".repeat(50);
        let compressed = compress_gzip(payload.clone()).await.unwrap();
        assert!(compressed.len() < payload.len());
        let restored = decompress(compressed, Compression::Gzip).await.unwrap();
        assert_eq!(restored, payload);
    }

    #[tokio::test]
    async fn zstd_round_trips() {
        let payload = b"line one\nline two\nline three\n".to_vec();
        let compressed =
            tokio::task::spawn_blocking(move || zstd::stream::encode_all(&payload[..], 3))
                .await
                .unwrap()
                .unwrap();
        let restored = decompress(compressed, Compression::Zst).await.unwrap();
        assert_eq!(restored, b"line one\nline two\nline three\n".to_vec());
    }
}
