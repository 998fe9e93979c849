use std::borrow::Cow;

use openssl::{
    pkey::{PKey, Private},
    x509::X509,
};
use secrecy::{ExposeSecret, SecretString};

use crate::IdentityError;

/// Some configuration stores cannot hold multi-line values, so PEM text often
/// arrives with every line break written as the two characters `\n`.
pub(crate) fn normalize_newlines(value: &str) -> Cow<'_, str> {
    if value.contains("\\n") {
        Cow::Owned(value.replace("\\r\\n", "\n").replace("\\n", "\n"))
    } else {
        Cow::Borrowed(value)
    }
}

/// Parses every certificate in a PEM bundle, in order.
pub(crate) fn certificates(what: &'static str, pem: &str) -> Result<Vec<X509>, IdentityError> {
    let pem = normalize_newlines(pem);

    let certificates =
        X509::stack_from_pem(pem.trim().as_bytes()).map_err(|source| IdentityError::InvalidPem { what, source })?;

    if certificates.is_empty() {
        return Err(IdentityError::NoCertificate(what));
    }

    Ok(certificates)
}

/// Parses an unencrypted PKCS#8, PKCS#1 or SEC1 private key.
pub(crate) fn private_key(what: &'static str, pem: &SecretString) -> Result<PKey<Private>, IdentityError> {
    let pem = SecretString::from(normalize_newlines(pem.expose_secret()).into_owned());

    PKey::private_key_from_pem(pem.expose_secret().trim().as_bytes())
        .map_err(|source| IdentityError::InvalidPem { what, source })
}
