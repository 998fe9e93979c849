use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::{Config, Error, IdentityConfig, UpstreamConfig};

pub(crate) const CERT_PEM: &str = "CERT_PEM";
pub(crate) const KEY_PEM: &str = "KEY_PEM";
pub(crate) const CA_CERT_PEM: &str = "CA_CERT_PEM";
pub(crate) const P12_BASE64: &str = "P12_BASE64";
pub(crate) const P12_PASSPHRASE: &str = "P12_PASSPHRASE";
pub(crate) const UPSTREAM_LIVE_URL: &str = "UPSTREAM_LIVE_URL";
pub(crate) const UPSTREAM_TEST_URL: &str = "UPSTREAM_TEST_URL";
pub(crate) const UPSTREAM_TIMEOUT: &str = "UPSTREAM_TIMEOUT";
pub(crate) const UPSTREAM_ACCEPT_INVALID_CERTS: &str = "UPSTREAM_ACCEPT_INVALID_CERTS";

pub(crate) fn load<F>(lookup: F) -> crate::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // Configuration stores frequently export unset keys as empty strings.
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let defaults = UpstreamConfig::default();

    let upstream = UpstreamConfig {
        live_url: match var(UPSTREAM_LIVE_URL) {
            Some(value) => parse_https_url(UPSTREAM_LIVE_URL, &value)?,
            None => defaults.live_url,
        },
        test_url: match var(UPSTREAM_TEST_URL) {
            Some(value) => parse_https_url(UPSTREAM_TEST_URL, &value)?,
            None => defaults.test_url,
        },
        timeout: match var(UPSTREAM_TIMEOUT) {
            Some(value) => parse_timeout(UPSTREAM_TIMEOUT, &value)?,
            None => defaults.timeout,
        },
        accept_invalid_certs: match var(UPSTREAM_ACCEPT_INVALID_CERTS) {
            Some(value) => parse_flag(UPSTREAM_ACCEPT_INVALID_CERTS, &value)?,
            None => defaults.accept_invalid_certs,
        },
    };

    let identity = IdentityConfig {
        cert_pem: var(CERT_PEM),
        key_pem: var(KEY_PEM).map(SecretString::from),
        ca_cert_pem: var(CA_CERT_PEM),
        p12_base64: var(P12_BASE64).map(SecretString::from),
        // Whitespace can be part of a passphrase.
        p12_passphrase: lookup(P12_PASSPHRASE)
            .filter(|value| !value.is_empty())
            .map(SecretString::from),
    };

    if identity.uses_pem() && identity.uses_pkcs12() {
        log::warn!("both {P12_BASE64} and {CERT_PEM}/{KEY_PEM} are set, the client identity cannot be built");
    }

    Ok(Config {
        server: Default::default(),
        upstream,
        identity,
    })
}

fn parse_https_url(key: &'static str, value: &str) -> crate::Result<Url> {
    let url = Url::parse(value.trim()).map_err(|err| Error::InvalidValue {
        key,
        reason: err.to_string(),
    })?;

    if url.scheme() != "https" {
        return Err(Error::InvalidValue {
            key,
            reason: format!("expected an https URL, got scheme '{}'", url.scheme()),
        });
    }

    Ok(url)
}

fn parse_timeout(key: &'static str, value: &str) -> crate::Result<Duration> {
    let timeout = duration_str::parse(value.trim()).map_err(|err| Error::InvalidValue {
        key,
        reason: err.to_string(),
    })?;

    if timeout.is_zero() {
        return Err(Error::InvalidValue {
            key,
            reason: "timeout must be greater than zero".to_string(),
        });
    }

    Ok(timeout)
}

fn parse_flag(key: &'static str, value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidValue {
            key,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
