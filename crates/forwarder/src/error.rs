use std::{error::Error as _, fmt, fmt::Write as _};

use identity::IdentityError;

/// The HTTPS client could not be built from the client identity. This is a
/// configuration problem: nothing was sent upstream.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Failed to load the client identity into the HTTPS client: {}", error_chain(.0))]
    ClientIdentity(#[source] reqwest::Error),

    #[error("Failed to load CA_CERT_PEM into the HTTPS client: {}", error_chain(.0))]
    TrustedCa(#[source] reqwest::Error),

    #[error("Failed to build the HTTPS client: {}", error_chain(.0))]
    Client(#[source] reqwest::Error),
}

/// The outbound exchange did not complete. No HTTP status is available.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };

        Self {
            kind,
            message: error_chain(&error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request or response did not finish within the configured timeout.
    Timeout,
    /// DNS resolution, TCP connect or the TLS handshake failed.
    Connect,
    /// The request could not be sent.
    Request,
    /// The response body could not be read.
    Body,
}

impl TransportErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// reqwest keeps the useful part (refused, unknown issuer, ...) in the source chain.
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        let cause_message = cause.to_string();

        if !message.ends_with(&cause_message) {
            let _ = write!(message, ": {cause_message}");
        }

        source = cause.source();
    }

    message
}
