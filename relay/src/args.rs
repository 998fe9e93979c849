use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use clap::Parser;
use config::{DEFAULT_PORT, TlsConfig};

/// Forwards JSON payloads to an HTTPS API that requires a client certificate.
///
/// Credentials and upstream endpoints are read from the environment:
/// CERT_PEM, KEY_PEM, CA_CERT_PEM, P12_BASE64, P12_PASSPHRASE,
/// UPSTREAM_LIVE_URL, UPSTREAM_TEST_URL, UPSTREAM_TIMEOUT and
/// UPSTREAM_ACCEPT_INVALID_CERTS.
#[derive(Debug, Parser)]
#[command(name = "relay", version, about)]
pub struct Args {
    /// IP address to listen on
    #[arg(long, env = "LISTEN_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub listen_address: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log filter, for example "info" or "server=debug,forwarder=debug"
    #[arg(long, env = "RELAY_LOG", default_value = "info")]
    pub log: String,

    /// Certificate for serving the inbound side over TLS
    #[arg(long, env = "TLS_CERTIFICATE", requires = "tls_key", value_name = "PATH")]
    pub tls_certificate: Option<PathBuf>,

    /// Private key for serving the inbound side over TLS
    #[arg(long, env = "TLS_KEY", requires = "tls_certificate", value_name = "PATH")]
    pub tls_key: Option<PathBuf>,

    /// Exit at startup if the client identity cannot be loaded
    #[arg(long, env = "REQUIRE_IDENTITY")]
    pub require_identity: bool,
}

impl Args {
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.port)
    }

    pub fn tls(&self) -> Option<TlsConfig> {
        match (&self.tls_certificate, &self.tls_key) {
            (Some(certificate), Some(key)) => Some(TlsConfig {
                certificate: certificate.clone(),
                key: key.clone(),
            }),
            _ => None,
        }
    }
}
