use openssl::{
    pkey::{PKeyRef, Private},
    x509::{X509, X509Ref},
};

use crate::IdentityError;

/// Splits a set of certificates into the one whose public key belongs to
/// `private_key` and the rest, which keep their relative order.
///
/// Position in the input carries no meaning: some PKCS#12 producers put CA
/// certificates ahead of the end-entity one. Exactly one certificate must
/// match, anything else is an error.
pub fn identify_leaf(
    certificates: Vec<X509>,
    private_key: &PKeyRef<Private>,
) -> Result<(X509, Vec<X509>), IdentityError> {
    let (matching, chain): (Vec<_>, Vec<_>) = certificates
        .into_iter()
        .partition(|certificate| matches_key(certificate, private_key));

    let mut matching = matching.into_iter();

    match (matching.next(), matching.len()) {
        (Some(leaf), 0) => Ok((leaf, chain)),
        (Some(_), others) => Err(IdentityError::AmbiguousLeaf(others + 1)),
        (None, _) => Err(IdentityError::NoMatchingCertificate),
    }
}

pub(crate) fn matches_key(certificate: &X509Ref, private_key: &PKeyRef<Private>) -> bool {
    certificate
        .public_key()
        .is_ok_and(|public_key| public_key.public_eq(private_key))
}
