use anyhow::Context;
use args::Args;
use clap::Parser;
use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

mod args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("a rustls crypto provider is already installed"))?;

    let config = load_config(&args)?;

    let shutdown_signal = CancellationToken::new();

    tokio::spawn({
        let shutdown_signal = shutdown_signal.clone();

        async move {
            if let Err(err) = terminated().await {
                log::error!("failed to listen for shutdown signals: {err}");
                return;
            }

            log::info!("shutdown requested");
            shutdown_signal.cancel();
        }
    });

    let serve_config = ServeConfig {
        listen_address: config.server.listen_address,
        config,
        shutdown_signal,
        log_filter: args.log,
        require_identity: args.require_identity,
    };

    server::serve(serve_config).await?;

    Ok(())
}

/// Installs the logger first, so warnings raised while reading the environment are printed.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    server::logger::init(&args.log);

    let mut config = Config::from_env().context("invalid configuration")?;
    config.server.listen_address = args.socket_address();
    config.server.tls = args.tls();

    Ok(config)
}

// Wait for SIGINT or SIGTERM.
#[cfg(unix)]
async fn terminated() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => (),
        _ = terminate.recv() => (),
    }

    Ok(())
}

#[cfg(not(unix))]
async fn terminated() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
