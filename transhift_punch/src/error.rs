use thiserror::Error;

#[derive(Debug, Error)]
pub enum PunchError {
    /// Name resolution, dial or TLS handshake failure; nothing is handed to the caller
    #[error("connection to {addr} failed: {cause}")]
    ConnectionFailed { addr: String, cause: String },

    #[error("tls configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
