//! HTTP front of the relay: accepts JSON payloads and forwards them over mutual TLS.

mod error;
mod extract;
pub mod logger;
mod relay;

use std::{net::SocketAddr, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::{Error, RelayError};
pub use relay::Relay;

pub(crate) type Result<T> = std::result::Result<T, error::Error>;

/// In-flight requests get this long to finish once shutdown is signalled.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

pub struct ServeConfig {
    pub listen_address: SocketAddr,
    pub config: Config,
    /// Cancelling this token stops the server gracefully.
    pub shutdown_signal: CancellationToken,
    /// Filter string such as "info" or "server=debug,forwarder=debug".
    pub log_filter: String,
    /// Fail startup instead of answering 500 when the client identity cannot be built.
    pub require_identity: bool,
}

pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter,
        require_identity,
    }: ServeConfig,
) -> crate::Result<()> {
    logger::init(&log_filter);

    let Config {
        server,
        upstream,
        identity,
    } = config;

    log::info!(
        live = upstream.live_url.as_str(),
        test = upstream.test_url.as_str();
        "upstream endpoints configured"
    );

    let relay = Relay::new(upstream, identity);

    // Build the identity up front so that broken credentials show up in the startup logs.
    match relay.forwarder() {
        Ok(_) => log::info!("client identity loaded"),
        Err(err) if require_identity => return Err(error::Error::Identity(err.to_string())),
        Err(err) => log::warn!("client identity is not usable, proxy requests will fail: {err}"),
    }

    let app = router(relay);

    let listener = TcpListener::bind(listen_address).await.map_err(error::Error::Bind)?;

    match &server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| error::Error::Tls(e.to_string()))?;

            log::info!("Relay listening on https://{listen_address}");

            let handle = axum_server::Handle::new();

            tokio::spawn({
                let handle = handle.clone();

                async move {
                    shutdown_signal.cancelled().await;
                    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
                }
            });

            // axum-server accepts only std listeners.
            let std_listener = listener.into_std().map_err(error::Error::Bind)?;

            axum_server::from_tcp_rustls(std_listener, rustls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(|e| error::Error::Server(std::io::Error::other(e)))?;
        }
        None => {
            log::info!("Relay listening on http://{listen_address}");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal.cancelled_owned())
                .await
                .map_err(error::Error::Server)?;
        }
    }

    log::info!("Relay stopped");

    Ok(())
}

/// Routes of the relay, without any listener attached.
pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/health", get(relay::health))
        .route("/proxy", post(relay::proxy))
        .with_state(relay)
}
