//! Client-side TLS: wraps the TCP connection in rustls, verifying the
//! server against the single certificate named by `--tls-cert`.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

pub async fn connect(
    cert_path: &Path,
    server_host: &str,
    tcp: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let file = std::fs::File::open(cert_path)
        .with_context(|| format!("open tls cert {}", cert_path.display()))?;
    let mut reader = BufReader::new(file);
    let raw_certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("read tls cert {}: {e}", cert_path.display()))?;
    if raw_certs.is_empty() {
        bail!("no certificates found in {}", cert_path.display());
    }

    let mut roots = RootCertStore::empty();
    for der in raw_certs {
        roots
            .add(der)
            .map_err(|e| anyhow!("add tls cert to root store: {e:?}"))?;
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let domain = if server_host.is_empty() {
        "localhost"
    } else {
        server_host
    };
    let server_name = ServerName::try_from(domain.to_string())
        .map_err(|_| anyhow!("invalid server hostname for tls: {domain:?}"))?;

    let connector = TlsConnector::from(Arc::new(config));
    connector
        .connect(server_name, tcp)
        .await
        .context("tls handshake failed")
}
