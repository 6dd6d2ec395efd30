use std::sync::Arc;

use logrelay_server::{config::Config, context::ServerContext, listener, tls};

// #[tokio::main] starts the async runtime (like Go's scheduler)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("logrelay-server: configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_logging(cfg.verbose, cfg.log_file.as_deref());

    tracing::info!("logrelay-server starting");

    let acceptor = if cfg.tls {
        let cert = cfg
            .tls_cert_file
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--tls-cert is required when a certificate is configured"))?;
        let key = cfg
            .tls_key_file
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--tls-key is required alongside --tls-cert"))?;
        Some(tls::build_acceptor(cert, key, cfg.tls_key_password.as_deref())?)
    } else {
        None
    };

    let bind_host = cfg.bind_host.clone();
    let bind_port = cfg.bind_port;
    let ctx = Arc::new(ServerContext::new(&cfg));

    match listener::serve(&bind_host, bind_port, acceptor, ctx).await {
        Ok(()) => {
            tracing::info!("logrelay-server done");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "logrelay-server failed");
            Err(e)
        }
    }
}

fn init_logging(verbose: bool, log_file: Option<&std::path::Path>) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, open_error) = match log_file {
        Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => (Some(fmt::layer().with_writer(file)), None),
            Err(e) => (None, Some((path.to_path_buf(), e))),
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some((path, e)) = open_error {
        tracing::warn!(path = %path.display(), error = %e, "could not open server log file");
    }
}
