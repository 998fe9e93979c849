//! HTTPS server standing in for the partner API. It only accepts clients
//! presenting a certificate issued by the configured client root.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CONTENT_TYPE, LOCATION},
    },
    response::{IntoResponse, Response},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use rustls::{RootCertStore, ServerConfig, server::WebPkiClientVerifier};
use tokio::net::TcpListener;
use url::Url;

use crate::pki::{Authority, Issued};

/// One request as seen by the mock.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: String,
    delay: Option<Duration>,
    location: Option<&'static str>,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

pub struct MockUpstreamBuilder {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: String,
    delay: Option<Duration>,
    location: Option<&'static str>,
}

impl Default for MockUpstreamBuilder {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some("application/json"),
            body: r#"{"ok":true}"#.to_string(),
            delay: None,
            location: None,
        }
    }
}

impl MockUpstreamBuilder {
    pub fn status(mut self, status: u16) -> Self {
        self.status = StatusCode::from_u16(status).unwrap();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(mut self, content_type: Option<&'static str>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sends a `Location` header, for answering with a redirect.
    pub fn location(mut self, location: &'static str) -> Self {
        self.location = Some(location);
        self
    }

    /// Waits this long before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Serves with `server_cert` and requires client certificates chaining to `client_root`.
    pub async fn spawn(self, server_cert: &Issued, client_root: &Authority) -> MockUpstream {
        let mut roots = RootCertStore::empty();
        roots.add(client_root.cert_der()).unwrap();

        let verifier = WebPkiClientVerifier::builder(Arc::new(roots)).build().unwrap();

        let server_config = ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(vec![server_cert.cert_der()], server_cert.key_der())
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));

        let state = MockState {
            status: self.status,
            content_type: self.content_type,
            body: self.body,
            delay: self.delay,
            location: self.location,
            received: received.clone(),
        };

        let app = Router::new().fallback(record).with_state(state);
        let handle = Handle::new();

        tokio::spawn({
            let handle = handle.clone();
            let rustls_config = RustlsConfig::from_config(Arc::new(server_config));
            let listener = listener.into_std().unwrap();

            async move {
                axum_server::from_tcp_rustls(listener, rustls_config)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
                    .unwrap();
            }
        });

        MockUpstream {
            address,
            received,
            handle,
        }
    }
}

pub struct MockUpstream {
    address: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
    handle: Handle,
}

impl MockUpstream {
    pub fn builder() -> MockUpstreamBuilder {
        MockUpstreamBuilder::default()
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("https://{}{path}", self.address)).unwrap()
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

async fn record(State(state): State<MockState>, uri: Uri, headers: axum::http::HeaderMap, body: Bytes) -> Response {
    let request = ReceivedRequest {
        path: uri.path().to_string(),
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    };

    state.received.lock().unwrap().push(request);

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = (state.status, Body::from(state.body)).into_response();

    if let Some(content_type) = state.content_type {
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    if let Some(location) = state.location {
        response.headers_mut().insert(LOCATION, HeaderValue::from_static(location));
    }

    response
}
