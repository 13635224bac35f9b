//! Connection bootstrap for transhift peers.
//!
//! This crate provides:
//! - The line-based version compatibility handshake
//! - The metadata envelope exchanged before file bytes flow
//! - Single-byte protocol responses and node roles
//! - Session helpers that drive the post-handshake exchange

pub mod config;
pub mod digest;
pub mod error;
pub mod protocol;
pub mod session;
pub mod utils;

// Re-export public API
pub use config::AppConfig;
pub use error::{EnvelopeError, ProtocolError};
pub use protocol::compat::CompatibilityTable;
pub use protocol::constants::{APP_VERSION, PROTO_CHUNK_SIZE, PROTO_PORT};
pub use protocol::envelope::{Framing, MetadataEnvelope};
pub use protocol::message::ProtocolMessage;
pub use protocol::negotiate::{Negotiation, Negotiator};
pub use protocol::role::NodeRole;
