//! One client session: a single header handshake followed by repeated
//! `data` commands, each awaited before the next is sent (§4.4).

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;

use logrelay_protocol::{
    frame, hashutil, Auth, CompressionKind, DataMeta, Header, LengthPayload, Prefix,
    DATA_COMMAND, DEFAULT_FRAME_TIMEOUT, HEADER_COMMAND,
};

use crate::context::AgentContext;

/// Either a plain TCP stream or a TLS stream over one — the session only
/// ever needs to read and write frames, so it is boxed behind this alias.
trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub struct ClientSession {
    conn: BufReader<Box<dyn Stream>>,
    pub server_length: u64,
}

impl ClientSession {
    pub async fn connect(
        ctx: &AgentContext,
        path: &Path,
        prefix: &[u8],
    ) -> anyhow::Result<Self> {
        let tcp = TcpStream::connect((ctx.config.server_host.as_str(), ctx.config.server_port))
            .await?;

        let boxed: Box<dyn Stream> = if ctx.config.tls {
            let cert = ctx
                .config
                .tls_cert
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("--tls requires --tls-cert"))?;
            Box::new(crate::tls::connect(cert, &ctx.config.server_host, tcp).await?)
        } else {
            Box::new(tcp)
        };
        let mut conn = BufReader::new(boxed);

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        let header = Header {
            hostname,
            path: path.to_string_lossy().into_owned(),
            prefix: Prefix {
                length: prefix.len() as u32,
                sha1: hashutil::sha1_b64(prefix),
            },
            auth: Auth {
                client_token: ctx.config.client_token.clone(),
            },
        };

        frame::with_deadline(
            DEFAULT_FRAME_TIMEOUT,
            frame::write_request(&mut conn, HEADER_COMMAND, &header, &[]),
        )
        .await?;
        let reply = frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::read_reply(&mut conn))
            .await?;
        let payload = reply.into_result()?;
        let length_payload: LengthPayload = match payload {
            Some(value) => serde_json::from_value(value)?,
            None => anyhow::bail!("server did not return a length with its header reply"),
        };

        Ok(Self {
            conn,
            server_length: length_payload.length,
        })
    }

    pub async fn send_data(&mut self, offset: u64, chunk: Vec<u8>) -> anyhow::Result<()> {
        let compressed = logrelay_protocol::compression::compress_gzip(chunk.clone()).await?;
        let (payload, compression) = if compressed.len() < chunk.len() {
            (compressed, Some(CompressionKind::Gzip))
        } else {
            (chunk, None)
        };

        let meta = DataMeta { offset, compression };
        frame::with_deadline(
            DEFAULT_FRAME_TIMEOUT,
            frame::write_request(&mut self.conn, DATA_COMMAND, &meta, &payload),
        )
        .await?;
        let reply = frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::read_reply(&mut self.conn))
            .await?;
        reply.into_result()?;
        Ok(())
    }
}
