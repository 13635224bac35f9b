//! Post-handshake exchange: envelope, password verdict, checksum verdict.
//!
//! The initiating peer offers the envelope and waits for verdicts; the accepting
//! peer reads it, checks the password digest and answers. File bytes flow
//! between the password and checksum verdicts and are not handled here.

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::digest::digests_match;
use crate::error::ProtocolError;
use crate::protocol::envelope::{Framing, MetadataEnvelope};
use crate::protocol::message::ProtocolMessage;

/// Initiator: send the envelope and wait for the password verdict
pub async fn offer_envelope<S>(
    stream: &mut S,
    envelope: &MetadataEnvelope,
    framing: Framing,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Offering {}", envelope);
    envelope.write_to(stream, framing).await?;

    match ProtocolMessage::recv(stream).await? {
        ProtocolMessage::PasswordMatch => Ok(()),
        ProtocolMessage::PasswordMismatch => {
            warn!("Peer rejected password for {}", envelope.file_name);
            Err(ProtocolError::PasswordRejected)
        }
        other => Err(ProtocolError::UnexpectedResponse(other)),
    }
}

/// Acceptor: read the envelope, check the password digest and answer.
///
/// On mismatch the verdict is still sent before the error is returned.
pub async fn accept_envelope<S>(
    stream: &mut S,
    expected_password_digest: &[u8],
    framing: Framing,
) -> Result<MetadataEnvelope, ProtocolError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let envelope = MetadataEnvelope::read_from(stream, framing).await?;
    let matched = digests_match(&envelope.password_digest, expected_password_digest);

    ProtocolMessage::password(matched).send(stream).await?;

    if !matched {
        warn!("Password mismatch for incoming {}", envelope);
        return Err(ProtocolError::PasswordRejected);
    }

    info!("Accepted {}", envelope);
    Ok(envelope)
}

/// Acceptor: report whether the received file matches the announced checksum
pub async fn confirm_checksum<W>(
    stream: &mut W,
    envelope: &MetadataEnvelope,
    computed_checksum: &[u8],
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let matched = digests_match(&envelope.file_checksum, computed_checksum);
    ProtocolMessage::checksum(matched).send(stream).await?;

    if matched {
        Ok(())
    } else {
        warn!("Checksum mismatch for {}", envelope.file_name);
        Err(ProtocolError::ChecksumRejected)
    }
}

/// Initiator: wait for the checksum verdict after the file bytes are sent
pub async fn await_checksum<R>(stream: &mut R) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match ProtocolMessage::recv(stream).await? {
        ProtocolMessage::ChecksumMatch => Ok(()),
        ProtocolMessage::ChecksumMismatch => Err(ProtocolError::ChecksumRejected),
        other => Err(ProtocolError::UnexpectedResponse(other)),
    }
}
