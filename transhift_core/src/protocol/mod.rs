//! Wire contract between two transhift peers.
//!
//! Per connection, in order: role byte, version handshake, metadata envelope,
//! single-byte responses.

pub mod compat;
pub mod constants;
pub mod envelope;
pub mod message;
pub mod negotiate;
pub mod role;
