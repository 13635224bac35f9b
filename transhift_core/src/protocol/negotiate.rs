use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::compat::CompatibilityTable;
use super::constants::{APP_VERSION, MAX_VERSION_LINE};
use crate::error::ProtocolError;

/// Outcome of a successful version handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    pub remote_version: String,
    pub local_accepts: bool,
    pub remote_accepts: bool,
}

/// Runs the version compatibility handshake over an open stream.
///
/// The exchange is strictly alternating: our version line, their version line,
/// our verdict byte, their verdict byte. Either side accepting is enough, so a
/// newer build can declare compatibility with an older one that has never
/// heard of it.
#[derive(Debug, Clone)]
pub struct Negotiator {
    local_version: String,
    table: Arc<CompatibilityTable>,
    timeout: Option<Duration>,
}

impl Negotiator {
    pub fn new(table: Arc<CompatibilityTable>) -> Self {
        Self {
            local_version: APP_VERSION.to_string(),
            table,
            timeout: None,
        }
    }

    /// Announce a version other than [`APP_VERSION`]
    pub fn with_local_version(mut self, version: impl Into<String>) -> Self {
        self.local_version = version.into();
        self
    }

    /// Bound the whole exchange; a stalled peer yields [`ProtocolError::Timeout`]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn local_version(&self) -> &str {
        &self.local_version
    }

    pub async fn negotiate<S>(&self, stream: &mut S) -> Result<Negotiation, ProtocolError>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(stream))
                .await
                .map_err(|_| ProtocolError::Timeout(limit))?,
            None => self.exchange(stream).await,
        }
    }

    async fn exchange<S>(&self, stream: &mut S) -> Result<Negotiation, ProtocolError>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        // 1. Announce our version
        stream.write_all(self.local_version.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        // 2. Learn theirs
        let remote_version = read_version_line(stream).await?;
        debug!("Remote announced version {:?}", remote_version);

        // 3. Send our verdict
        let local_accepts = self.table.accepts(&self.local_version, &remote_version);
        stream.write_all(&[u8::from(local_accepts)]).await?;
        stream.flush().await?;

        // 4. Read their verdict
        let mut verdict = [0u8; 1];
        stream.read_exact(&mut verdict).await?;
        let remote_accepts = verdict[0] != 0x00;

        if !local_accepts && !remote_accepts {
            warn!(
                "Version handshake rejected: local {} remote {}",
                self.local_version, remote_version
            );
            return Err(ProtocolError::IncompatibleVersions {
                local: self.local_version.clone(),
                remote: remote_version,
            });
        }

        info!(
            "Version handshake ok: local {} remote {} (local_accepts={}, remote_accepts={})",
            self.local_version, remote_version, local_accepts, remote_accepts
        );

        Ok(Negotiation {
            remote_version,
            local_accepts,
            remote_accepts,
        })
    }
}

/// Read one newline-terminated version token, newline stripped
async fn read_version_line<S>(stream: &mut S) -> Result<String, ProtocolError>
where
    S: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = (&mut *stream)
        .take(MAX_VERSION_LINE as u64)
        .read_until(b'\n', &mut line)
        .await?;

    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed the stream before sending its version",
        )
        .into());
    }

    if line.pop() != Some(b'\n') {
        let reason = if n >= MAX_VERSION_LINE {
            format!("version line exceeds {} bytes", MAX_VERSION_LINE)
        } else {
            "version line is missing its newline".to_string()
        };
        return Err(ProtocolError::MalformedHandshake(reason));
    }

    String::from_utf8(line)
        .map_err(|_| ProtocolError::MalformedHandshake("version is not valid UTF-8".to_string()))
}
