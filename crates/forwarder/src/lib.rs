//! Sends a JSON payload upstream over HTTPS, authenticated with a client certificate.

mod error;

use bytes::Bytes;
use config::UpstreamConfig;
use identity::ClientIdentity;
use reqwest::{
    Certificate, Identity, StatusCode,
    header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use secrecy::ExposeSecret;
use url::Url;

pub use error::{BuildError, TransportError, TransportErrorKind};

/// One payload to deliver.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub url: Url,
    /// Sent as is, never inspected.
    pub payload: serde_json::Value,
    /// Extra request headers. `Content-Type` and `Content-Length` are always set by the forwarder.
    pub headers: HeaderMap,
}

impl ForwardRequest {
    pub fn new(url: Url, payload: serde_json::Value) -> Self {
        Self {
            url,
            payload,
            headers: HeaderMap::new(),
        }
    }
}

/// A completed upstream exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct ForwardResult {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// HTTPS client holding the client identity. Cheap to share: clones use the same connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(identity: &ClientIdentity, config: &UpstreamConfig) -> Result<Self, BuildError> {
        let pem = identity.to_pem_bundle()?;
        let client_identity = Identity::from_pem(pem.expose_secret()).map_err(BuildError::ClientIdentity)?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(client_identity)
            .timeout(config.timeout)
            // A redirect would be a second outbound attempt, possibly to another host.
            .redirect(reqwest::redirect::Policy::none())
            .tcp_nodelay(true);

        let trusted_ca = identity.trusted_ca_der()?;

        if !trusted_ca.is_empty() {
            log::debug!("validating upstream certificates against {} CA_CERT_PEM root(s)", trusted_ca.len());
            builder = builder.tls_built_in_root_certs(false);

            for der in trusted_ca {
                let certificate = Certificate::from_der(&der).map_err(BuildError::TrustedCa)?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        if config.accept_invalid_certs {
            log::warn!("upstream certificate validation is disabled by UPSTREAM_ACCEPT_INVALID_CERTS");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(BuildError::Client)?;

        Ok(Self { client })
    }

    /// Makes exactly one POST attempt. Any HTTP status counts as a result;
    /// only a failure to complete the exchange is an error.
    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResult, TransportError> {
        let ForwardRequest {
            url,
            payload,
            mut headers,
        } = request;

        headers.remove(CONTENT_TYPE);
        headers.remove(CONTENT_LENGTH);

        let host = url.host_str().unwrap_or_default().to_string();

        log::debug!(host = host.as_str(), path = url.path(); "forwarding payload upstream");

        // `json` serializes to a fixed-length body and sets `Content-Type: application/json`.
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&payload)
            .send()
            .await
            .map_err(|error| transport_error(&host, error))?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(|error| transport_error(&host, error))?;

        log::info!(host = host.as_str(), status = status.as_u16(); "upstream responded with {status}");

        Ok(ForwardResult {
            status,
            content_type,
            body,
        })
    }
}

fn transport_error(host: &str, error: reqwest::Error) -> TransportError {
    let error = TransportError::from(error);
    log::error!(host = host, kind = error.kind().code(); "upstream request failed: {}", error.message());
    error
}
