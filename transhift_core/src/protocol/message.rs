use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Single-byte responses sent by the accepting peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolMessage {
    PasswordMismatch = 0x00,
    PasswordMatch = 0x01,
    ChecksumMismatch = 0x02,
    ChecksumMatch = 0x03,
}

impl ProtocolMessage {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn password(matched: bool) -> Self {
        if matched {
            Self::PasswordMatch
        } else {
            Self::PasswordMismatch
        }
    }

    pub fn checksum(matched: bool) -> Self {
        if matched {
            Self::ChecksumMatch
        } else {
            Self::ChecksumMismatch
        }
    }

    /// Send this message and flush; responses are never buffered
    pub async fn send<W>(self, writer: &mut W) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_u8(self.as_byte()).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn recv<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let byte = reader.read_u8().await?;
        Self::try_from(byte)
    }
}

impl TryFrom<u8> for ProtocolMessage {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Self::PasswordMismatch),
            0x01 => Ok(Self::PasswordMatch),
            0x02 => Ok(Self::ChecksumMismatch),
            0x03 => Ok(Self::ChecksumMatch),
            other => Err(ProtocolError::UnexpectedMessage(other)),
        }
    }
}
