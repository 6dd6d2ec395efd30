//! One accepted connection: handshake, authentication, destination
//! resolution/rotation, and the strict append loop (§4.6).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use logrelay_protocol::message::DataMeta;
use logrelay_protocol::{
    frame, hashutil, Header, LengthPayload, ProtocolError, DATA_COMMAND, DEFAULT_FRAME_TIMEOUT,
    HEADER_COMMAND,
};

use crate::context::ServerContext;
use crate::destination::Destination;

pub async fn handle_connection<S>(stream: S, peer_addr: SocketAddr, ctx: Arc<ServerContext>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    tracing::info!(peer = %peer_addr, "new client");
    let mut conn = BufReader::new(stream);
    match run(&mut conn, &ctx).await {
        Ok(()) => {}
        Err(e) => tracing::warn!(peer = %peer_addr, error = %e, "failed to handle client"),
    }
    tracing::info!(peer = %peer_addr, "closing connection");
}

async fn run<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut BufReader<S>,
    ctx: &ServerContext,
) -> anyhow::Result<()> {
    let header = match read_header(conn).await {
        Ok(header) => header,
        Err(e) => {
            frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::write_reply_error(conn, &e.to_string()))
                .await?;
            return Err(e.into());
        }
    };

    if !authenticate(&header, ctx) {
        frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::write_reply_error(conn, "unauthorized"))
            .await?;
        anyhow::bail!("unauthorized client token from host {:?}", header.hostname);
    }

    let (mut destination, known_length) =
        match Destination::open(&ctx.destination_directory, &header.hostname, &header.path, &header.prefix).await {
            Ok(opened) => opened,
            Err(e) => {
                frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::write_reply_error(conn, &e.to_string()))
                    .await?;
                return Err(e);
            }
        };

    frame::with_deadline(
        DEFAULT_FRAME_TIMEOUT,
        frame::write_reply_ok(conn, Some(&LengthPayload { length: known_length })),
    )
    .await?;

    tracing::debug!(
        path = %destination.path.display(),
        length = known_length,
        "accepted session"
    );

    append_loop(conn, &mut destination).await
}

async fn read_header<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut BufReader<S>,
) -> anyhow::Result<Header> {
    let request = frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::read_request(conn)).await?;
    if request.command != HEADER_COMMAND {
        anyhow::bail!(ProtocolError::UnexpectedCommand(request.command));
    }
    if !request.data.is_empty() {
        anyhow::bail!(ProtocolError::MalformedFrame(
            "header command must not carry a payload".to_string()
        ));
    }
    let header: Header = serde_json::from_value(request.meta)?;
    Ok(header)
}

fn authenticate(header: &Header, ctx: &ServerContext) -> bool {
    let token_hash = hashutil::sha1_hex(header.auth.client_token.as_bytes());
    ctx.accepted_token_hashes
        .iter()
        .any(|accepted| hashutil::constant_time_eq(accepted, &token_hash))
}

async fn append_loop<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut BufReader<S>,
    destination: &mut Destination,
) -> anyhow::Result<()> {
    loop {
        let request = match frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::read_request(conn)).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if request.command != DATA_COMMAND {
            let err = ProtocolError::UnexpectedCommand(request.command);
            frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::write_reply_error(conn, &err.to_string()))
                .await?;
            anyhow::bail!(err);
        }

        let meta: DataMeta = match serde_json::from_value(request.meta) {
            Ok(meta) => meta,
            Err(e) => {
                frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::write_reply_error(conn, &e.to_string()))
                    .await?;
                anyhow::bail!(e);
            }
        };

        let payload = match meta.compression {
            None => request.data,
            Some(codec) => match logrelay_protocol::compression::decompress(request.data, codec).await {
                Ok(payload) => payload,
                Err(e) => {
                    frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::write_reply_error(conn, &e.to_string()))
                        .await?;
                    anyhow::bail!(e);
                }
            },
        };

        if let Err(e) = destination.append_at(meta.offset, &payload).await {
            frame::with_deadline(DEFAULT_FRAME_TIMEOUT, frame::write_reply_error(conn, &e.to_string()))
                .await?;
            anyhow::bail!(e);
        }

        frame::with_deadline(
            DEFAULT_FRAME_TIMEOUT,
            frame::write_reply_ok(conn, None::<&()>),
        )
        .await?;
    }
}
