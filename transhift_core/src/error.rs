use std::time::Duration;
use thiserror::Error;

/// Errors raised while bootstrapping a peer connection.
///
/// Every variant is terminal for the connection it was raised on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed handshake: {0}")]
    MalformedHandshake(String),

    #[error("incompatible versions {local} and {remote}")]
    IncompatibleVersions { local: String, remote: String },

    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    #[error("peer rejected the password")]
    PasswordRejected,

    #[error("peer reported a checksum mismatch")]
    ChecksumRejected,

    #[error("unexpected protocol message byte {0:#04x}")]
    UnexpectedMessage(u8),

    #[error("unexpected response {0:?}")]
    UnexpectedResponse(crate::ProtocolMessage),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),

    #[error("field {0} contains a newline and cannot use legacy framing")]
    DelimiterInField(&'static str),

    #[error("field {field} is {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
