//! Error types for the cert-tools library.
//!
//! Every error is terminal for the invocation that raised it: nothing is
//! retried and no partial artifact is ever written.

use thiserror::Error;

/// The main error type for cert-tools operations.
#[derive(Error, Debug)]
pub enum CertToolError {
    /// Missing or unreadable input, malformed PEM armor, wrong PEM label
    #[error("Input error: {0}")]
    InputError(String),

    /// File system failure while reading inputs or scanning a directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed revocation record, timestamp, serial or attribute text
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Key material does not decode as a P-256 key
    #[error("Key format error: {0}")]
    KeyFormatError(String),

    /// A self-signature (CSR) failed to verify
    #[error("Signature error: {0}")]
    SignatureError(String),

    /// The encoder or signer rejected a template
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<der::Error> for CertToolError {
    fn from(err: der::Error) -> Self {
        CertToolError::EncodingError(err.to_string())
    }
}

/// A specialized Result type for cert-tools operations.
pub type Result<T> = std::result::Result<T, CertToolError>;
