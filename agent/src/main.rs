use std::sync::Arc;

use logrelay_agent::{context::AgentContext, scanner, Config};

// #[tokio::main] starts the async runtime (like Go's scheduler)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't wired up yet (it depends on the config we just
            // failed to load), so a config error goes straight to stderr.
            eprintln!("logrelay-agent: configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_logging(cfg.verbose, cfg.log_file.as_deref());

    tracing::info!("logrelay-agent starting");
    let ctx = Arc::new(AgentContext::new(cfg));

    match scanner::run(ctx).await {
        Ok(()) => {
            tracing::info!("logrelay-agent done");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "logrelay-agent failed");
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
        tracing::warn!(path = %path.display(), error = %e, "could not open agent log file");
    }
}
