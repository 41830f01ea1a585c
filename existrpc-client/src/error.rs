//! Client error types.

use existrpc_protocol::{DecodeError, EncodeError, Fault, FaultCode};
use thiserror::Error;

/// Maximum number of response body bytes kept for diagnostics.
pub const MAX_DIAGNOSTIC_BODY: usize = 512;

/// Misuse of a result handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("result handle {0} was already released")]
    Released(i64),
}

/// Client errors.
///
/// Faults mean the server answered and refused; transport and decode errors
/// mean the exchange itself failed.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),

    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("cannot encode call: {0}")]
    Encode(#[from] EncodeError),

    #[error("failed to decode response: {source} (body: {body})")]
    Decode {
        #[source]
        source: DecodeError,
        body: String,
    },

    #[error("fault {code}: {message}")]
    Fault { code: FaultCode, message: String },

    #[error("{method} returned {found}, expected {expected}")]
    UnexpectedResult {
        method: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ClientError {
    /// Wraps a decode failure, keeping a truncated copy of the raw body.
    pub fn decode(source: DecodeError, body: &[u8]) -> Self {
        ClientError::Decode {
            source,
            body: truncate_body(body),
        }
    }

    /// Returns whether the server reported a fault.
    pub fn is_fault(&self) -> bool {
        matches!(self, ClientError::Fault { .. })
    }

    /// Returns the fault code, if this is a fault.
    pub fn fault_code(&self) -> Option<&FaultCode> {
        match self {
            ClientError::Fault { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns whether the exchange failed below the XML-RPC layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Http(_)
                | ClientError::HttpStatus { .. }
                | ClientError::ConnectionClosed
                | ClientError::Timeout
                | ClientError::TlsHandshake(_)
        )
    }

    /// Returns whether retrying the same call might succeed.
    ///
    /// Nothing in this crate retries; this is advice for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) | ClientError::Timeout | ClientError::ConnectionClosed => true,
            ClientError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<Fault> for ClientError {
    fn from(fault: Fault) -> Self {
        ClientError::Fault {
            code: fault.code,
            message: fault.message,
        }
    }
}

pub(crate) fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_DIAGNOSTIC_BODY {
        return text.into_owned();
    }
    let mut end = MAX_DIAGNOSTIC_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
