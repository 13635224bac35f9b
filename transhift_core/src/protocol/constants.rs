/// Application and protocol revision announced during the handshake
pub const APP_VERSION: &str = "0.2.0";

/// Well-known rendezvous port (TCP + TLS)
pub const PROTO_PORT: u16 = 50977;

/// Block size used by the file transfer loop
pub const PROTO_CHUNK_SIZE: usize = 4096;

/// Longest version line accepted from a peer, newline included
pub const MAX_VERSION_LINE: usize = 256;

/// Largest single envelope field accepted when decoding
pub const MAX_FIELD_LEN: usize = 64 * 1024;

/// Length of the next block to move given how many bytes remain
pub fn chunk_len(remaining: u64) -> usize {
    remaining.min(PROTO_CHUNK_SIZE as u64) as usize
}
