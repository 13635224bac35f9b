use anyhow::Result;
use blake3::Hasher;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Read buffer for checksumming (1MB)
const HASH_BUFFER_SIZE: usize = 1024 * 1024;

const PASSWORD_CONTEXT: &str = "transhift 2024-06 password digest";

/// Digest a shared password so it never travels in clear
pub fn password_digest(password: &str) -> [u8; 32] {
    blake3::derive_key(PASSWORD_CONTEXT, password.as_bytes())
}

/// Compute the BLAKE3 checksum of a file
pub async fn file_checksum(file_path: &Path) -> Result<[u8; 32]> {
    let mut file = File::open(file_path).await?;
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(*hasher.finalize().as_bytes())
}

/// Compare two digests without short-circuiting on the first difference
pub fn digests_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
