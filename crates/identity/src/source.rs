use config::IdentityConfig;
use secrecy::{ExposeSecret, SecretString};

use crate::IdentityError;

/// The credential shape picked from the configured values.
#[derive(Debug)]
pub(crate) enum Source<'a> {
    SplitPem {
        certificate: &'a str,
        private_key: &'a SecretString,
    },
    Pkcs12 {
        archive: &'a SecretString,
        passphrase: &'a str,
    },
}

impl<'a> Source<'a> {
    pub(crate) fn select(config: &'a IdentityConfig) -> Result<Self, IdentityError> {
        if config.uses_pkcs12() && config.uses_pem() {
            return Err(IdentityError::AmbiguousSource);
        }

        if let Some(archive) = &config.p12_base64 {
            let passphrase = config
                .p12_passphrase
                .as_ref()
                .map(|passphrase| passphrase.expose_secret())
                .unwrap_or_default();

            return Ok(Source::Pkcs12 { archive, passphrase });
        }

        match (&config.cert_pem, &config.key_pem) {
            (Some(certificate), Some(private_key)) => Ok(Source::SplitPem {
                certificate,
                private_key,
            }),
            (Some(_), None) => Err(IdentityError::IncompletePem("KEY_PEM")),
            (None, Some(_)) => Err(IdentityError::IncompletePem("CERT_PEM")),
            (None, None) => Err(IdentityError::MissingCredentials),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Source::SplitPem { .. } => "pem",
            Source::Pkcs12 { .. } => "pkcs12",
        }
    }
}
