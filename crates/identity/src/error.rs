use openssl::error::ErrorStack;

/// A missing or malformed client credential. Messages name the offending
/// configuration key but never include the credential material itself.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("No client credentials configured: set CERT_PEM and KEY_PEM, or P12_BASE64 and P12_PASSPHRASE")]
    MissingCredentials,

    #[error("Missing {0}: CERT_PEM and KEY_PEM must be set together")]
    IncompletePem(&'static str),

    #[error("Ambiguous client credentials: P12_BASE64 cannot be combined with CERT_PEM or KEY_PEM")]
    AmbiguousSource,

    #[error("Failed to parse {what}: {source}")]
    InvalidPem {
        what: &'static str,
        #[source]
        source: ErrorStack,
    },

    #[error("No certificate found in {0}")]
    NoCertificate(&'static str),

    #[error("P12_BASE64 is not valid base64")]
    InvalidBase64(#[source] base64::DecodeError),

    #[error("P12_BASE64 is not a PKCS#12 container: {0}")]
    InvalidPkcs12(#[source] ErrorStack),

    #[error("Failed to decrypt the PKCS#12 container, check P12_PASSPHRASE: {0}")]
    Pkcs12Decrypt(#[source] ErrorStack),

    #[error("No private key found in the PKCS#12 container")]
    MissingPrivateKey,

    #[error("Could not identify client certificate: no certificate matches the private key")]
    NoMatchingCertificate,

    #[error("Could not identify client certificate: {0} certificates match the private key")]
    AmbiguousLeaf(usize),

    #[error("Failed to encode the client identity: {0}")]
    Encode(#[source] ErrorStack),
}
