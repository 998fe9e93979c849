//! Relay configuration, read from environment-style key/value pairs.

mod error;
mod loader;

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use secrecy::SecretString;
use url::Url;

pub use error::Error;

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Production endpoint of the property-listing API.
pub const DEFAULT_LIVE_URL: &str = "https://adfapi.rightmove.co.uk/v1/property/sendpropertydetails";

/// Sandbox endpoint of the property-listing API, selected with `test_mode`.
pub const DEFAULT_TEST_URL: &str = "https://adfapi.adftest.rightmove.com/v1/property/sendpropertydetails";

/// Upper bound for a single upstream exchange.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Default, Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub identity: IdentityConfig,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> crate::Result<Config> {
        loader::load(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary key lookup. Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        loader::load(lookup)
    }
}

/// HTTP listener settings. These come from the command line, not from the environment loader.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
    /// Serve the inbound side over TLS instead of plain HTTP.
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            tls: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub certificate: PathBuf,
    pub key: PathBuf,
}

/// Where and how payloads are forwarded.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub live_url: Url,
    pub test_url: Url,
    pub timeout: Duration,
    /// Skips server certificate validation. Only ever enabled explicitly.
    pub accept_invalid_certs: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            live_url: Url::parse(DEFAULT_LIVE_URL).expect("Invalid default live URL"),
            test_url: Url::parse(DEFAULT_TEST_URL).expect("Invalid default test URL"),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

/// Raw client credential material, as found in the environment.
///
/// Which of the two accepted shapes is in use is decided by the identity loader,
/// so a half-configured relay still starts and reports the problem per request.
#[derive(Default, Debug, Clone)]
pub struct IdentityConfig {
    /// `CERT_PEM`: client certificate, optionally followed by its chain.
    pub cert_pem: Option<String>,
    /// `KEY_PEM`: unencrypted private key.
    pub key_pem: Option<SecretString>,
    /// `CA_CERT_PEM`: roots used to validate the upstream server.
    pub ca_cert_pem: Option<String>,
    /// `P12_BASE64`: base64 encoded PKCS#12 container.
    pub p12_base64: Option<SecretString>,
    /// `P12_PASSPHRASE`: passphrase of the container, empty when absent.
    pub p12_passphrase: Option<SecretString>,
}

impl IdentityConfig {
    pub fn uses_pem(&self) -> bool {
        self.cert_pem.is_some() || self.key_pem.is_some()
    }

    pub fn uses_pkcs12(&self) -> bool {
        self.p12_base64.is_some()
    }
}
