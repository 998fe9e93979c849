pub mod pki;
pub mod upstream;

use std::{collections::BTreeMap, net::SocketAddr, sync::Once, time::Duration};

use config::Config;
use serde_json::json;
use server::ServeConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use pki::{Authority, Issued, TestPki};
pub use upstream::{MockUpstream, ReceivedRequest};

static INIT: Once = Once::new();

#[ctor::ctor]
fn init_crypto_provider() {
    INIT.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("Failed to install default crypto provider");
    });
}

const LOG_FILTER: &str = "server=debug,forwarder=debug,identity=debug,config=debug,integration_tests=debug";

/// Test client for making HTTP requests to the test server
#[derive(Clone)]
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a JSON body to the relay endpoint
    pub async fn proxy(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/proxy", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Send a payload with the default routing
    pub async fn forward(&self, payload: serde_json::Value) -> reqwest::Response {
        self.proxy(json!({ "payload": payload })).await
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    pub async fn try_get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(format!("{}{}", self.base_url, path)).send().await
    }

    /// Create a request with the given method and path
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }
}

/// A relay running on an ephemeral port, stopped when dropped.
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _task_handle: tokio::task::JoinHandle<()>,
    shutdown_signal: CancellationToken,
}

impl TestServer {
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    #[allow(clippy::panic)]
    async fn start(env: BTreeMap<String, String>, require_identity: bool) -> Result<Self, server::Error> {
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let shutdown_signal = CancellationToken::new();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
            shutdown_signal: shutdown_signal.clone(),
            log_filter: LOG_FILTER.to_string(),
            require_identity,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();

        let task_handle = tokio::spawn(async move {
            // Free the port for the server to bind.
            drop(listener);

            let result = server::serve(serve_config).await;
            let _ = tx.send(result);
        });

        let client = TestClient::new(format!("http://{address}"));

        for _ in 0..50 {
            if let Ok(result) = rx.try_recv() {
                result?;
                break;
            }

            if client.try_get("/health").await.is_ok() {
                return Ok(TestServer {
                    client,
                    address,
                    _task_handle: task_handle,
                    shutdown_signal,
                });
            }

            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        panic!("Relay failed to become ready at {address}");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_signal.cancel();
    }
}

/// Collects the environment the relay would see.
#[derive(Default)]
pub struct TestServerBuilder {
    env: BTreeMap<String, String>,
    require_identity: bool,
}

impl TestServerBuilder {
    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    /// Split PEM credentials for the client, trusting the upstream root.
    pub fn pem_credentials(self, pki: &TestPki) -> Self {
        self.env("CERT_PEM", pki.client_chain_pem())
            .env("KEY_PEM", pki.client.key_pem.clone())
            .env("CA_CERT_PEM", pki.upstream_ca.cert_pem())
    }

    /// Same as [`Self::pem_credentials`], with newlines escaped as a single-line env value would carry them.
    pub fn escaped_pem_credentials(self, pki: &TestPki) -> Self {
        let escape = |pem: String| pem.replace('\n', "\\n");

        self.env("CERT_PEM", escape(pki.client_chain_pem()))
            .env("KEY_PEM", escape(pki.client.key_pem.clone()))
            .env("CA_CERT_PEM", pki.upstream_ca.cert_pem())
    }

    /// PKCS#12 credentials for the client, trusting the upstream root.
    pub fn pkcs12_credentials(self, pki: &TestPki, passphrase: &str) -> Self {
        self.env("P12_BASE64", pki.client_pkcs12(passphrase))
            .env("P12_PASSPHRASE", passphrase)
            .env("CA_CERT_PEM", pki.upstream_ca.cert_pem())
    }

    pub fn live_url(self, url: url::Url) -> Self {
        self.env("UPSTREAM_LIVE_URL", url.as_str())
    }

    pub fn test_url(self, url: url::Url) -> Self {
        self.env("UPSTREAM_TEST_URL", url.as_str())
    }

    pub fn require_identity(mut self) -> Self {
        self.require_identity = true;
        self
    }

    pub async fn build(self) -> TestServer {
        TestServer::start(self.env, self.require_identity).await.unwrap()
    }

    /// Starts the relay, returning the startup error instead of panicking.
    pub async fn try_build(self) -> Result<TestServer, server::Error> {
        TestServer::start(self.env, self.require_identity).await
    }
}
