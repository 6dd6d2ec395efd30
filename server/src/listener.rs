//! Accepts connections (optionally TLS-terminated) and spawns an independent
//! session handler per connection (§4.5).

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::context::ServerContext;
use crate::session;

pub async fn serve(
    bind_host: &str,
    bind_port: u16,
    acceptor: Option<TlsAcceptor>,
    ctx: Arc<ServerContext>,
) -> anyhow::Result<()> {
    let bind_addr = if bind_host.is_empty() {
        format!("0.0.0.0:{bind_port}")
    } else {
        format!("{bind_host}:{bind_port}")
    };

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, tls = acceptor.is_some(), "listening for agents");

    loop {
        let (socket, peer_addr) = listener.accept().await?;
        let ctx = ctx.clone();
        let acceptor = acceptor.clone();

        tokio::spawn(async move {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, error = %e, "could not set TCP_NODELAY");
            }

            match acceptor {
                Some(acceptor) => match acceptor.accept(socket).await {
                    Ok(tls_stream) => session::handle_connection(tls_stream, peer_addr, ctx).await,
                    Err(e) => {
                        tracing::warn!(peer = %peer_addr, error = %e, "tls handshake failed");
                    }
                },
                None => session::handle_connection(socket, peer_addr, ctx).await,
            }
        });
    }
}
