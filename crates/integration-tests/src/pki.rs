//! In-memory certificate authorities for the upstream server and the relay's client identity.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use openssl::{pkcs12::Pkcs12, pkey::PKey, stack::Stack, x509::X509};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

pub struct Authority {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl Authority {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let cert = ca_params(name).self_signed(&key).unwrap();

        Self { cert, key }
    }

    pub fn intermediate(&self, name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let cert = ca_params(name).signed_by(&key, &self.cert, &self.key).unwrap();

        Self { cert, key }
    }

    /// A server certificate valid for `127.0.0.1` and `localhost`.
    pub fn server(&self, name: &str) -> Issued {
        self.issue(
            name,
            vec!["127.0.0.1".to_string(), "localhost".to_string()],
            ExtendedKeyUsagePurpose::ServerAuth,
        )
    }

    pub fn client(&self, name: &str) -> Issued {
        self.issue(name, Vec::new(), ExtendedKeyUsagePurpose::ClientAuth)
    }

    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    pub fn cert_der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    fn issue(&self, name: &str, subject_alt_names: Vec<String>, usage: ExtendedKeyUsagePurpose) -> Issued {
        let key = KeyPair::generate().unwrap();

        let mut params = CertificateParams::new(subject_alt_names).unwrap();
        params.distinguished_name = common_name(name);
        params.extended_key_usages = vec![usage];

        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();

        Issued {
            cert_pem: cert.pem(),
            cert_der: cert.der().clone(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        }
    }
}

pub struct Issued {
    pub cert_pem: String,
    pub key_pem: String,
    cert_der: CertificateDer<'static>,
    key_der: Vec<u8>,
}

impl Issued {
    pub fn cert_der(&self) -> CertificateDer<'static> {
        self.cert_der.clone()
    }

    pub fn key_der(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }

    /// Packs this key, its certificate and `chain` into a base64 PKCS#12 container.
    pub fn pkcs12_base64(&self, chain: &[&Authority], passphrase: &str) -> String {
        let key = PKey::private_key_from_pem(self.key_pem.as_bytes()).unwrap();
        let cert = X509::from_pem(self.cert_pem.as_bytes()).unwrap();

        let mut ca = Stack::new().unwrap();

        for authority in chain {
            ca.push(X509::from_pem(authority.cert_pem().as_bytes()).unwrap()).unwrap();
        }

        let der = Pkcs12::builder()
            .name("relay client")
            .pkey(&key)
            .cert(&cert)
            .ca(ca)
            .build2(passphrase)
            .unwrap()
            .to_der()
            .unwrap();

        STANDARD.encode(der)
    }
}

/// Everything one mutual TLS exchange needs: an upstream server certificate and a
/// client certificate issued through an intermediate.
pub struct TestPki {
    pub upstream_ca: Authority,
    pub upstream: Issued,
    pub client_root: Authority,
    pub client_intermediate: Authority,
    pub client: Issued,
}

impl TestPki {
    pub fn new() -> Self {
        let upstream_ca = Authority::new("upstream root");
        let upstream = upstream_ca.server("upstream");

        let client_root = Authority::new("client root");
        let client_intermediate = client_root.intermediate("client intermediate");
        let client = client_intermediate.client("relay client");

        Self {
            upstream_ca,
            upstream,
            client_root,
            client_intermediate,
            client,
        }
    }

    /// `CERT_PEM` value with the intermediate first, so the leaf has to be found by key.
    pub fn client_chain_pem(&self) -> String {
        format!("{}{}", self.client_intermediate.cert_pem(), self.client.cert_pem)
    }

    pub fn client_pkcs12(&self, passphrase: &str) -> String {
        self.client.pkcs12_base64(&[&self.client_intermediate], passphrase)
    }
}

impl Default for TestPki {
    fn default() -> Self {
        Self::new()
    }
}

fn ca_params(name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = common_name(name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
}

fn common_name(name: &str) -> DistinguishedName {
    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, name);
    distinguished_name
}
