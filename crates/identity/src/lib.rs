//! Mutual TLS client identity.
//!
//! Credentials come either as split PEM strings or as a single base64
//! PKCS#12 container. Both are normalized into a [`ClientIdentity`]: the
//! certificate belonging to the private key, the remaining chain, and the
//! optional roots used to validate the server.

mod error;
mod leaf;
mod pem;
mod pkcs12;
mod source;

use std::fmt;

use config::IdentityConfig;
use openssl::{
    nid::Nid,
    pkey::{PKey, Private},
    x509::X509,
};
use secrecy::SecretSlice;

pub use error::IdentityError;
pub use leaf::identify_leaf;
use source::Source;

pub(crate) type Result<T> = std::result::Result<T, IdentityError>;

/// Builds the client identity from configuration. No network I/O happens here,
/// and the same configuration always yields an equivalent identity.
pub fn load(config: &IdentityConfig) -> Result<ClientIdentity> {
    let source = Source::select(config)?;
    let source_name = source.name();

    let (certificates, private_key) = match source {
        Source::SplitPem {
            certificate,
            private_key,
        } => (
            pem::certificates("CERT_PEM", certificate)?,
            pem::private_key("KEY_PEM", private_key)?,
        ),
        Source::Pkcs12 { archive, passphrase } => {
            let contents = pkcs12::unpack(archive, passphrase)?;
            (contents.certificates, contents.private_key)
        }
    };

    let (leaf_certificate, chain_certificates) = identify_leaf(certificates, &private_key)?;

    let trusted_ca = match &config.ca_cert_pem {
        Some(ca) => pem::certificates("CA_CERT_PEM", ca)?,
        None => Vec::new(),
    };

    let identity = ClientIdentity {
        leaf_certificate,
        chain_certificates,
        private_key,
        trusted_ca,
    };

    log::info!(
        "loaded {} client identity for '{}' with {} chain certificate(s), valid until {}",
        source_name,
        identity.common_name(),
        identity.chain_certificates.len(),
        identity.leaf_certificate.not_after(),
    );

    Ok(identity)
}

/// A client certificate, its chain, and the matching private key.
///
/// Built once and shared read-only. The private key never leaves this type
/// except through [`ClientIdentity::to_pem_bundle`].
pub struct ClientIdentity {
    leaf_certificate: X509,
    chain_certificates: Vec<X509>,
    private_key: PKey<Private>,
    trusted_ca: Vec<X509>,
}

impl ClientIdentity {
    pub fn leaf_certificate(&self) -> &X509 {
        &self.leaf_certificate
    }

    /// Intermediates sent along with the leaf, leaf-adjacent first.
    pub fn chain_certificates(&self) -> &[X509] {
        &self.chain_certificates
    }

    /// Roots for validating the upstream server. Empty means built-in roots.
    pub fn trusted_ca(&self) -> &[X509] {
        &self.trusted_ca
    }

    /// Common name of the leaf certificate, for logging.
    pub fn common_name(&self) -> String {
        self.leaf_certificate
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|name| name.to_string())
            .unwrap_or_else(|| "<no common name>".to_string())
    }

    /// The private key (PKCS#8) followed by the leaf and chain certificates, as PEM.
    pub fn to_pem_bundle(&self) -> Result<SecretSlice<u8>> {
        let mut pem = self.private_key.private_key_to_pem_pkcs8().map_err(IdentityError::Encode)?;

        for certificate in std::iter::once(&self.leaf_certificate).chain(&self.chain_certificates) {
            pem.extend_from_slice(&certificate.to_pem().map_err(IdentityError::Encode)?);
        }

        Ok(SecretSlice::from(pem))
    }

    /// The trusted CA certificates, DER encoded.
    pub fn trusted_ca_der(&self) -> Result<Vec<Vec<u8>>> {
        self.trusted_ca
            .iter()
            .map(|certificate| certificate.to_der().map_err(IdentityError::Encode))
            .collect()
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("leaf_certificate", &self.common_name())
            .field("chain_certificates", &self.chain_certificates.len())
            .field("private_key", &"[REDACTED]")
            .field("trusted_ca", &self.trusted_ca.len())
            .finish()
    }
}
