use std::sync::{Arc, OnceLock};

use axum::{
    Json,
    body::Body,
    extract::State,
    http::header::CONTENT_TYPE,
    response::Response,
};
use config::{IdentityConfig, UpstreamConfig};
use forwarder::{BuildError, ForwardRequest, ForwardResult, Forwarder};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{error::RelayError, extract::Extract};

/// Shared handler state: the upstream settings and the lazily built, process-wide forwarder.
#[derive(Clone)]
pub struct Relay(Arc<RelayInner>);

impl std::ops::Deref for Relay {
    type Target = RelayInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct RelayInner {
    upstream: UpstreamConfig,
    identity: IdentityConfig,
    /// Credentials do not change at runtime, so a failure is remembered as well.
    forwarder: OnceLock<Result<Forwarder, BuildError>>,
}

impl Relay {
    pub fn new(upstream: UpstreamConfig, identity: IdentityConfig) -> Self {
        Self(Arc::new(RelayInner {
            upstream,
            identity,
            forwarder: OnceLock::new(),
        }))
    }

    /// Loads the client identity and builds the HTTPS client on first call.
    pub fn forwarder(&self) -> Result<&Forwarder, &BuildError> {
        self.forwarder
            .get_or_init(|| {
                let identity = identity::load(&self.identity)?;
                Forwarder::new(&identity, &self.upstream)
            })
            .as_ref()
    }

    /// An explicit `target_url` wins, then `test_mode` picks the sandbox endpoint.
    pub(crate) fn resolve_destination(&self, target_url: Option<&str>, test_mode: bool) -> Result<Url, RelayError> {
        let Some(target_url) = target_url else {
            let url = if test_mode {
                &self.upstream.test_url
            } else {
                &self.upstream.live_url
            };

            return Ok(url.clone());
        };

        let url = Url::parse(target_url).map_err(|err| RelayError::BadRequest(format!("Invalid target_url: {err}")))?;

        if url.scheme() != "https" {
            return Err(RelayError::BadRequest(format!(
                "Invalid target_url: expected an https URL, got scheme '{}'",
                url.scheme()
            )));
        }

        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProxyRequest {
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default)]
    target_url: Option<String>,
    #[serde(default)]
    test_mode: Option<bool>,
}

pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Forwards the payload and mirrors the upstream response. Dropping this
/// future, for example when the caller disconnects, cancels the upstream call.
pub(crate) async fn proxy(
    State(relay): State<Relay>,
    Extract(request): Extract<ProxyRequest>,
) -> Result<Response, RelayError> {
    if request.payload.is_null() {
        return Err(RelayError::BadRequest("Missing payload".to_string()));
    }

    let url = relay.resolve_destination(request.target_url.as_deref(), request.test_mode.unwrap_or_default())?;

    let forwarder = relay.forwarder().map_err(|err| {
        log::error!("cannot forward, client identity unavailable: {err}");
        RelayError::from(err)
    })?;

    let result = forwarder.forward(ForwardRequest::new(url, request.payload)).await?;

    Ok(mirror(result))
}

fn mirror(result: ForwardResult) -> Response {
    let ForwardResult {
        status,
        content_type,
        body,
    } = result;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }

    response
}
