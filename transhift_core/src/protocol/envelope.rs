use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::constants::MAX_FIELD_LEN;
use crate::error::EnvelopeError;
use crate::utils::format_size;

const DELIMITER: u8 = b'\n';

/// How the envelope fields are delimited on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `digest \n name \n size(8, BE) \n checksum \n`, as spoken by 0.2.0 peers.
    /// Byte fields must not contain `\n`.
    Legacy,
    /// Each byte field carries a 4-byte big-endian length header; size is 8 bytes BE.
    #[default]
    LengthPrefixed,
}

/// Transfer metadata sent by the initiating peer before any file bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEnvelope {
    pub password_digest: Vec<u8>,
    pub file_name: String,
    pub file_size: u64,
    pub file_checksum: Vec<u8>,
}

impl MetadataEnvelope {
    pub fn encode(&self, framing: Framing) -> Result<Bytes, EnvelopeError> {
        self.check_fields(framing)?;

        let mut buf = BytesMut::with_capacity(
            self.password_digest.len() + self.file_name.len() + self.file_checksum.len() + 24,
        );

        match framing {
            Framing::Legacy => {
                buf.put_slice(&self.password_digest);
                buf.put_u8(DELIMITER);
                buf.put_slice(self.file_name.as_bytes());
                buf.put_u8(DELIMITER);
                buf.put_u64(self.file_size);
                buf.put_u8(DELIMITER);
                buf.put_slice(&self.file_checksum);
                buf.put_u8(DELIMITER);
            }
            Framing::LengthPrefixed => {
                put_field(&mut buf, &self.password_digest);
                put_field(&mut buf, self.file_name.as_bytes());
                buf.put_u64(self.file_size);
                put_field(&mut buf, &self.file_checksum);
            }
        }

        Ok(buf.freeze())
    }

    /// Decode a complete envelope; trailing bytes are rejected
    pub fn decode(bytes: &[u8], framing: Framing) -> Result<Self, EnvelopeError> {
        let mut buf = bytes;

        let envelope = match framing {
            Framing::Legacy => {
                let password_digest = take_line(&mut buf)?.to_vec();
                let file_name = utf8_name(take_line(&mut buf)?.to_vec())?;

                if buf.len() < 9 {
                    return Err(EnvelopeError::Malformed("file size block truncated"));
                }
                let (size, rest) = buf.split_at(8);
                if rest[0] != DELIMITER {
                    return Err(EnvelopeError::Malformed("file size block is not 8 bytes"));
                }
                buf = &rest[1..];
                let file_size = u64::from_be_bytes(size.try_into().map_err(|_| {
                    EnvelopeError::Malformed("file size block is not 8 bytes")
                })?);

                let file_checksum = take_line(&mut buf)?.to_vec();

                Self {
                    password_digest,
                    file_name,
                    file_size,
                    file_checksum,
                }
            }
            Framing::LengthPrefixed => {
                let password_digest = take_field(&mut buf, "password_digest")?.to_vec();
                let file_name = utf8_name(take_field(&mut buf, "file_name")?.to_vec())?;

                if buf.len() < 8 {
                    return Err(EnvelopeError::Malformed("file size block truncated"));
                }
                let (size, rest) = buf.split_at(8);
                buf = rest;
                let file_size = u64::from_be_bytes(size.try_into().map_err(|_| {
                    EnvelopeError::Malformed("file size block is not 8 bytes")
                })?);

                let file_checksum = take_field(&mut buf, "file_checksum")?.to_vec();

                Self {
                    password_digest,
                    file_name,
                    file_size,
                    file_checksum,
                }
            }
        };

        if !buf.is_empty() {
            return Err(EnvelopeError::Malformed("trailing bytes after envelope"));
        }

        Ok(envelope)
    }

    /// Encode and send the envelope, then flush
    pub async fn write_to<W>(&self, writer: &mut W, framing: Framing) -> Result<(), EnvelopeError>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.encode(framing)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read exactly one envelope from the stream, leaving following bytes unread
    pub async fn read_from<R>(reader: &mut R, framing: Framing) -> Result<Self, EnvelopeError>
    where
        R: AsyncBufRead + Unpin,
    {
        let envelope = match framing {
            Framing::Legacy => {
                let password_digest = read_line_field(reader, "password_digest").await?;
                let file_name = utf8_name(read_line_field(reader, "file_name").await?)?;

                let mut size = [0u8; 9];
                reader.read_exact(&mut size).await.map_err(truncated)?;
                if size[8] != DELIMITER {
                    return Err(EnvelopeError::Malformed("file size block is not 8 bytes"));
                }
                let mut size_be = [0u8; 8];
                size_be.copy_from_slice(&size[..8]);

                let file_checksum = read_line_field(reader, "file_checksum").await?;

                Self {
                    password_digest,
                    file_name,
                    file_size: u64::from_be_bytes(size_be),
                    file_checksum,
                }
            }
            Framing::LengthPrefixed => {
                let password_digest = read_prefixed_field(reader, "password_digest").await?;
                let file_name = utf8_name(read_prefixed_field(reader, "file_name").await?)?;
                let file_size = reader.read_u64().await.map_err(truncated)?;
                let file_checksum = read_prefixed_field(reader, "file_checksum").await?;

                Self {
                    password_digest,
                    file_name,
                    file_size,
                    file_checksum,
                }
            }
        };

        tracing::debug!("Received envelope: {}", envelope);
        Ok(envelope)
    }

    fn check_fields(&self, framing: Framing) -> Result<(), EnvelopeError> {
        let fields: [(&'static str, &[u8]); 3] = [
            ("password_digest", self.password_digest.as_slice()),
            ("file_name", self.file_name.as_bytes()),
            ("file_checksum", self.file_checksum.as_slice()),
        ];

        for (field, bytes) in fields {
            if bytes.len() > MAX_FIELD_LEN {
                return Err(EnvelopeError::FieldTooLong {
                    field,
                    len: bytes.len(),
                    max: MAX_FIELD_LEN,
                });
            }
            if framing == Framing::Legacy && bytes.contains(&DELIMITER) {
                return Err(EnvelopeError::DelimiterInField(field));
            }
        }
        Ok(())
    }
}

impl fmt::Display for MetadataEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: '{}', size: {}",
            self.file_name,
            format_size(self.file_size)
        )
    }
}

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

fn take_line<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], EnvelopeError> {
    let pos = buf
        .iter()
        .position(|&b| b == DELIMITER)
        .ok_or(EnvelopeError::Malformed("missing field delimiter"))?;
    let (field, rest) = buf.split_at(pos);
    *buf = &rest[1..];
    Ok(field)
}

fn take_field<'a>(buf: &mut &'a [u8], field: &'static str) -> Result<&'a [u8], EnvelopeError> {
    if buf.len() < 4 {
        return Err(EnvelopeError::Malformed("length header truncated"));
    }
    let (len, rest) = buf.split_at(4);
    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
    if len > MAX_FIELD_LEN {
        return Err(EnvelopeError::FieldTooLong {
            field,
            len,
            max: MAX_FIELD_LEN,
        });
    }
    if rest.len() < len {
        return Err(EnvelopeError::Malformed("field shorter than its length header"));
    }
    let (value, rest) = rest.split_at(len);
    *buf = rest;
    Ok(value)
}

async fn read_line_field<R>(reader: &mut R, field: &'static str) -> Result<Vec<u8>, EnvelopeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(MAX_FIELD_LEN as u64 + 1)
        .read_until(DELIMITER, &mut line)
        .await?;

    if line.pop() != Some(DELIMITER) {
        if n > MAX_FIELD_LEN {
            return Err(EnvelopeError::FieldTooLong {
                field,
                len: n,
                max: MAX_FIELD_LEN,
            });
        }
        return Err(EnvelopeError::Malformed("missing field delimiter"));
    }
    Ok(line)
}

async fn read_prefixed_field<R>(
    reader: &mut R,
    field: &'static str,
) -> Result<Vec<u8>, EnvelopeError>
where
    R: AsyncBufRead + Unpin,
{
    let len = reader.read_u32().await.map_err(truncated)? as usize;
    if len > MAX_FIELD_LEN {
        return Err(EnvelopeError::FieldTooLong {
            field,
            len,
            max: MAX_FIELD_LEN,
        });
    }

    let mut value = vec![0u8; len];
    reader.read_exact(&mut value).await.map_err(truncated)?;
    Ok(value)
}

fn utf8_name(bytes: Vec<u8>) -> Result<String, EnvelopeError> {
    String::from_utf8(bytes).map_err(|_| EnvelopeError::Malformed("file name is not valid UTF-8"))
}

fn truncated(e: io::Error) -> EnvelopeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        EnvelopeError::Malformed("envelope truncated")
    } else {
        EnvelopeError::Io(e)
    }
}
