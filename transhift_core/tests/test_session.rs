//! Post-handshake exchange between an initiator and an acceptor.

use std::io::Write;
use tokio::io::{BufReader, duplex};
use transhift_core::digest::{file_checksum, password_digest};
use transhift_core::session::{accept_envelope, await_checksum, confirm_checksum, offer_envelope};
use transhift_core::{Framing, MetadataEnvelope, ProtocolError};

async fn envelope_for(
    password: &str,
    contents: &[u8],
) -> (MetadataEnvelope, tempfile::NamedTempFile) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();

    let envelope = MetadataEnvelope {
        password_digest: password_digest(password).to_vec(),
        file_name: "holiday.jpg".to_string(),
        file_size: contents.len() as u64,
        file_checksum: file_checksum(file.path()).await.unwrap().to_vec(),
    };
    (envelope, file)
}

#[tokio::test]
async fn test_matching_password_and_checksum() {
    let (envelope, file) = envelope_for("correct horse", b"pixels").await;
    let (left, right) = duplex(4096);
    let mut initiator = BufReader::new(left);
    let mut acceptor = BufReader::new(right);

    let expected = password_digest("correct horse");
    let (offered, accepted) = tokio::join!(
        offer_envelope(&mut initiator, &envelope, Framing::LengthPrefixed),
        accept_envelope(&mut acceptor, &expected, Framing::LengthPrefixed),
    );
    offered.expect("Initiator should get PasswordMatch");
    let accepted = accepted.expect("Acceptor should accept the envelope");
    assert_eq!(accepted, envelope);

    // File bytes would flow here; the acceptor recomputes the checksum afterwards
    let computed = file_checksum(file.path()).await.unwrap();
    let (confirmed, awaited) = tokio::join!(
        confirm_checksum(&mut acceptor, &accepted, &computed),
        await_checksum(&mut initiator),
    );
    confirmed.unwrap();
    awaited.unwrap();
}

#[tokio::test]
async fn test_wrong_password_rejected_on_both_sides() {
    let (envelope, _file) = envelope_for("guess", b"data").await;
    let (left, right) = duplex(4096);
    let mut initiator = BufReader::new(left);
    let mut acceptor = BufReader::new(right);

    let expected = password_digest("secret");
    let (offered, accepted) = tokio::join!(
        offer_envelope(&mut initiator, &envelope, Framing::LengthPrefixed),
        accept_envelope(&mut acceptor, &expected, Framing::LengthPrefixed),
    );

    assert!(matches!(offered, Err(ProtocolError::PasswordRejected)));
    assert!(matches!(accepted, Err(ProtocolError::PasswordRejected)));
}

#[tokio::test]
async fn test_checksum_mismatch_reported() {
    let (envelope, _file) = envelope_for("pw", b"original").await;
    let (left, right) = duplex(64);
    let mut initiator = BufReader::new(left);
    let mut acceptor = BufReader::new(right);

    let corrupted = blake3::hash(b"corrupted");
    let (confirmed, awaited) = tokio::join!(
        confirm_checksum(&mut acceptor, &envelope, corrupted.as_bytes()),
        await_checksum(&mut initiator),
    );

    assert!(matches!(confirmed, Err(ProtocolError::ChecksumRejected)));
    assert!(matches!(awaited, Err(ProtocolError::ChecksumRejected)));
}

#[tokio::test]
async fn test_out_of_order_response_is_unexpected() {
    let (envelope, _file) = envelope_for("pw", b"x").await;
    let (left, right) = duplex(4096);
    let mut initiator = BufReader::new(left);
    let mut acceptor = BufReader::new(right);

    let (offered, _) = tokio::join!(
        offer_envelope(&mut initiator, &envelope, Framing::LengthPrefixed),
        async {
            MetadataEnvelope::read_from(&mut acceptor, Framing::LengthPrefixed)
                .await
                .unwrap();
            transhift_core::ProtocolMessage::ChecksumMatch
                .send(&mut acceptor)
                .await
                .unwrap();
        },
    );

    assert!(matches!(
        offered,
        Err(ProtocolError::UnexpectedResponse(
            transhift_core::ProtocolMessage::ChecksumMatch
        ))
    ));
}
