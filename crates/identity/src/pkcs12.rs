use base64::{Engine as _, engine::general_purpose::STANDARD};
use openssl::{
    pkcs12::{ParsedPkcs12_2, Pkcs12},
    pkey::{PKey, Private},
    x509::X509,
};
use secrecy::{ExposeSecret, SecretSlice, SecretString};

use crate::IdentityError;

/// Everything found inside a PKCS#12 container.
pub(crate) struct Contents {
    pub(crate) certificates: Vec<X509>,
    pub(crate) private_key: PKey<Private>,
}

/// Decodes, decrypts and unpacks a base64 encoded PKCS#12 container.
///
/// All certificate bags are returned together. Picking the leaf is left to
/// [`crate::identify_leaf`], which does not trust the container's own pairing.
pub(crate) fn unpack(archive: &SecretString, passphrase: &str) -> Result<Contents, IdentityError> {
    // Line-wrapped base64 is common when the value is pasted from a terminal.
    let encoded: String = archive
        .expose_secret()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let der = SecretSlice::from(STANDARD.decode(encoded).map_err(IdentityError::InvalidBase64)?);

    let pkcs12 = Pkcs12::from_der(der.expose_secret()).map_err(IdentityError::InvalidPkcs12)?;
    let ParsedPkcs12_2 { cert, pkey, ca } = pkcs12.parse2(passphrase).map_err(IdentityError::Pkcs12Decrypt)?;

    let private_key = pkey.ok_or(IdentityError::MissingPrivateKey)?;
    let certificates = cert.into_iter().chain(ca.into_iter().flatten()).collect();

    Ok(Contents {
        certificates,
        private_key,
    })
}
