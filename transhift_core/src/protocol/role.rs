use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Part a node plays at the rendezvous, announced once right after TLS is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NodeRole {
    Sender = 0x00,
    Receiver = 0x01,
}

impl NodeRole {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Sender),
            0x01 => Some(Self::Receiver),
            _ => None,
        }
    }

    /// The role a matching peer is expected to announce
    pub fn counterpart(self) -> Self {
        match self {
            Self::Sender => Self::Receiver,
            Self::Receiver => Self::Sender,
        }
    }

    /// One-shot announcement: write the role byte and flush
    pub async fn announce<W>(self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_u8(self.as_byte()).await?;
        writer.flush().await
    }

    /// Read a peer's announcement
    pub async fn read_announcement<R>(reader: &mut R) -> std::io::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let byte = reader.read_u8().await?;
        Self::from_byte(byte).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown node role byte {:#04x}", byte),
            )
        })
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}

impl FromStr for NodeRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sender" | "send" => Ok(Self::Sender),
            "receiver" | "receive" | "recv" => Ok(Self::Receiver),
            other => Err(anyhow::anyhow!("Unknown node role: {}", other)),
        }
    }
}
