//! Version handshake between two in-memory peers.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, duplex};
use transhift_core::{CompatibilityTable, Framing, MetadataEnvelope, Negotiator, ProtocolError};

fn negotiator(version: &str, table: CompatibilityTable) -> Negotiator {
    Negotiator::new(Arc::new(table)).with_local_version(version)
}

async fn run_pair(
    local: Negotiator,
    remote: Negotiator,
) -> (
    Result<transhift_core::Negotiation, ProtocolError>,
    Result<transhift_core::Negotiation, ProtocolError>,
) {
    let (left, right) = duplex(1024);
    let mut left = BufReader::new(left);
    let mut right = BufReader::new(right);

    let fut = async { tokio::join!(local.negotiate(&mut left), remote.negotiate(&mut right)) };
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("Negotiation should not hang")
}

#[tokio::test]
async fn test_identical_versions_succeed() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init()
        .ok();

    let (local, remote) = run_pair(
        negotiator("0.2.0", CompatibilityTable::default()),
        negotiator("0.2.0", CompatibilityTable::default()),
    )
    .await;

    let local = local.expect("Local side should succeed");
    let remote = remote.expect("Remote side should succeed");
    assert_eq!(local.remote_version, "0.2.0");
    assert_eq!(remote.remote_version, "0.2.0");
    assert!(local.local_accepts && local.remote_accepts);
}

#[tokio::test]
async fn test_mutual_rejection_fails_on_both_sides() {
    let (local, remote) = run_pair(
        negotiator("0.2.0", CompatibilityTable::default()),
        negotiator("0.3.0", CompatibilityTable::from_pairs([("0.3.0", ["0.3.0"])])),
    )
    .await;

    match local {
        Err(ProtocolError::IncompatibleVersions { local, remote }) => {
            assert_eq!(local, "0.2.0");
            assert_eq!(remote, "0.3.0");
        }
        other => panic!("Expected IncompatibleVersions, got {:?}", other),
    }

    let err = remote.unwrap_err();
    assert_eq!(err.to_string(), "incompatible versions 0.3.0 and 0.2.0");
}

#[tokio::test]
async fn test_one_sided_acceptance_is_enough() {
    let newer = CompatibilityTable::from_pairs([("0.3.0", ["0.3.0", "0.2.0"])]);
    let (local, remote) = run_pair(
        negotiator("0.2.0", CompatibilityTable::default()),
        negotiator("0.3.0", newer),
    )
    .await;

    let local = local.expect("Older side should accept the newer side's verdict");
    assert!(!local.local_accepts);
    assert!(local.remote_accepts);

    let remote = remote.expect("Newer side accepts the older version");
    assert!(remote.local_accepts);
    assert!(!remote.remote_accepts);
}

#[tokio::test]
async fn test_empty_version_is_a_regular_token() {
    let table = CompatibilityTable::from_pairs([("0.2.0", ["0.2.0", ""])]);
    let (local, remote) = run_pair(
        negotiator("0.2.0", table),
        negotiator("", CompatibilityTable::empty()),
    )
    .await;

    assert_eq!(local.unwrap().remote_version, "");
    assert_eq!(remote.unwrap().remote_version, "0.2.0");
}

#[tokio::test]
async fn test_wire_bytes_and_nonzero_verdict() {
    let (left, mut right) = duplex(1024);
    let mut left = BufReader::new(left);

    let peer = tokio::spawn(async move {
        let mut line = [0u8; 6];
        right.read_exact(&mut line).await.unwrap();
        assert_eq!(&line, b"0.2.0\n");

        right.write_all(b"9.9.9\n").await.unwrap();

        let mut verdict = [0u8; 1];
        right.read_exact(&mut verdict).await.unwrap();
        assert_eq!(verdict[0], 0x00, "0.2.0 does not list 9.9.9");

        // Any non-zero byte counts as acceptance
        right.write_all(&[0x7F]).await.unwrap();
        right
    });

    let outcome = negotiator("0.2.0", CompatibilityTable::default())
        .negotiate(&mut left)
        .await
        .expect("Remote acceptance should be honoured");
    assert_eq!(outcome.remote_version, "9.9.9");
    assert!(outcome.remote_accepts);

    peer.await.unwrap();
}

#[tokio::test]
async fn test_bytes_after_handshake_stay_readable() {
    let envelope = MetadataEnvelope {
        password_digest: vec![1; 32],
        file_name: "notes.md".to_string(),
        file_size: 42,
        file_checksum: vec![2; 32],
    };

    let (left, mut right) = duplex(4096);
    let mut left = BufReader::new(left);

    // Remote pipelines its whole side in one write
    let mut burst = b"0.2.0\n\x01".to_vec();
    burst.extend_from_slice(&envelope.encode(Framing::LengthPrefixed).unwrap());
    right.write_all(&burst).await.unwrap();

    negotiator("0.2.0", CompatibilityTable::default())
        .negotiate(&mut left)
        .await
        .unwrap();

    let received = MetadataEnvelope::read_from(&mut left, Framing::LengthPrefixed)
        .await
        .unwrap();
    assert_eq!(received, envelope);
}

#[tokio::test]
async fn test_closed_stream_mid_handshake_is_io_error() {
    let (left, mut right) = duplex(1024);
    let mut left = BufReader::new(left);

    tokio::spawn(async move {
        let mut line = [0u8; 6];
        let _ = right.read_exact(&mut line).await;
        drop(right);
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        negotiator("0.2.0", CompatibilityTable::default()).negotiate(&mut left),
    )
    .await
    .expect("Closing the stream must unblock the negotiator");

    assert!(
        matches!(result, Err(ProtocolError::Io(_))),
        "Expected Io error, got {:?}",
        result
    );
}

#[tokio::test]
async fn test_closed_before_verdict_is_io_error() {
    let (left, mut right) = duplex(1024);
    let mut left = BufReader::new(left);

    tokio::spawn(async move {
        let mut line = [0u8; 6];
        let _ = right.read_exact(&mut line).await;
        let _ = right.write_all(b"0.2.0\n").await;
        let mut verdict = [0u8; 1];
        let _ = right.read_exact(&mut verdict).await;
    });

    let result = negotiator("0.2.0", CompatibilityTable::default())
        .negotiate(&mut left)
        .await;
    assert!(matches!(result, Err(ProtocolError::Io(_))), "{:?}", result);
}

#[tokio::test]
async fn test_truncated_version_line_is_malformed() {
    let (left, mut right) = duplex(1024);
    let mut left = BufReader::new(left);

    tokio::spawn(async move {
        let mut line = [0u8; 6];
        let _ = right.read_exact(&mut line).await;
        let _ = right.write_all(b"0.2").await;
    });

    let result = negotiator("0.2.0", CompatibilityTable::default())
        .negotiate(&mut left)
        .await;
    assert!(
        matches!(result, Err(ProtocolError::MalformedHandshake(_))),
        "{:?}",
        result
    );
}

#[tokio::test]
async fn test_stalled_peer_hits_deadline() {
    let (left, _right) = duplex(1024);
    let mut left = BufReader::new(left);

    let result = negotiator("0.2.0", CompatibilityTable::default())
        .with_timeout(Duration::from_millis(100))
        .negotiate(&mut left)
        .await;

    assert!(
        matches!(result, Err(ProtocolError::Timeout(_))),
        "{:?}",
        result
    );
}
