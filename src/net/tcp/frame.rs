// In: src/net/tcp/frame.rs

//! Payload framing for the TCP backend.
//!
//! Size-negotiation traffic travels raw (both sides already know the exact
//! byte counts), but payload blobs are framed so the transport can
//! transparently zstd-compress large messages: a flag byte says how the body
//! is encoded, a little-endian `u64` gives the body's wire length. The
//! receiver always knows the decoded length from the prior size negotiation
//! and verifies it.

use crate::error::{SelatError, SelatResult};
use std::io::{Read, Write};

const FLAG_RAW: u8 = 0;
const FLAG_ZSTD: u8 = 1;

/// Messages below this size are never worth a zstd pass.
pub(crate) const COMPRESS_MIN_BYTES: usize = 512;

fn exec_err(what: &str, err: impl std::fmt::Display) -> SelatError {
    SelatError::ExecutionError(format!("{}: {}", what, err))
}

/// Writes one framed blob. When `compression_level` is set and the payload is
/// large enough, the body is zstd-compressed (unless that would grow it).
pub(crate) fn send_blob<W: Write>(
    writer: &mut W,
    payload: &[u8],
    compression_level: Option<i32>,
) -> SelatResult<()> {
    let compressed = match compression_level {
        Some(level) if payload.len() >= COMPRESS_MIN_BYTES => {
            let body = zstd::stream::encode_all(payload, level)
                .map_err(|e| exec_err("zstd compression failed", e))?;
            if body.len() < payload.len() {
                Some(body)
            } else {
                None
            }
        }
        _ => None,
    };

    let (flag, body) = match &compressed {
        Some(body) => (FLAG_ZSTD, body.as_slice()),
        None => (FLAG_RAW, payload),
    };

    let mut header = [0u8; 9];
    header[0] = flag;
    header[1..9].copy_from_slice(&(body.len() as u64).to_le_bytes());
    writer
        .write_all(&header)
        .and_then(|_| writer.write_all(body))
        .map_err(|e| exec_err("tcp send failed", e))
}

/// Reads one framed blob into `out`, whose length is the expected decoded
/// size from the size negotiation.
pub(crate) fn recv_blob<R: Read>(reader: &mut R, out: &mut [u8]) -> SelatResult<()> {
    let mut header = [0u8; 9];
    reader
        .read_exact(&mut header)
        .map_err(|e| exec_err("tcp recv failed", e))?;
    let flag = header[0];
    let wire_len = u64::from_le_bytes(header[1..9].try_into().unwrap()) as usize;

    match flag {
        FLAG_RAW => {
            if wire_len != out.len() {
                return Err(SelatError::ExecutionError(format!(
                    "framed payload is {} bytes, size negotiation promised {}",
                    wire_len,
                    out.len()
                )));
            }
            reader
                .read_exact(out)
                .map_err(|e| exec_err("tcp recv failed", e))
        }
        FLAG_ZSTD => {
            let mut body = vec![0u8; wire_len];
            reader
                .read_exact(&mut body)
                .map_err(|e| exec_err("tcp recv failed", e))?;
            let decoded = zstd::stream::decode_all(body.as_slice())
                .map_err(|e| exec_err("zstd decompression failed", e))?;
            if decoded.len() != out.len() {
                return Err(SelatError::ExecutionError(format!(
                    "decompressed payload is {} bytes, size negotiation promised {}",
                    decoded.len(),
                    out.len()
                )));
            }
            out.copy_from_slice(&decoded);
            Ok(())
        }
        other => Err(SelatError::ExecutionError(format!(
            "unknown payload frame flag {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(payload: &[u8], level: Option<i32>) -> Vec<u8> {
        let mut wire = Vec::new();
        send_blob(&mut wire, payload, level).unwrap();
        let mut out = vec![0u8; payload.len()];
        recv_blob(&mut wire.as_slice(), &mut out).unwrap();
        out
    }

    #[test]
    fn test_raw_roundtrip() {
        let payload = b"twelve bytes".to_vec();
        assert_eq!(roundtrip(&payload, None), payload);
    }

    #[test]
    fn test_empty_blob_roundtrip() {
        assert_eq!(roundtrip(&[], Some(3)), Vec::<u8>::new());
    }

    #[test]
    fn test_compressed_roundtrip_shrinks_wire() {
        let payload = vec![42u8; 64 * 1024];
        let mut wire = Vec::new();
        send_blob(&mut wire, &payload, Some(3)).unwrap();
        assert!(wire.len() < payload.len() / 4);
        let mut out = vec![0u8; payload.len()];
        recv_blob(&mut wire.as_slice(), &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_small_payloads_stay_raw_even_with_level() {
        let payload = vec![0u8; COMPRESS_MIN_BYTES - 1];
        let mut wire = Vec::new();
        send_blob(&mut wire, &payload, Some(3)).unwrap();
        assert_eq!(wire.len(), 9 + payload.len());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut wire = Vec::new();
        send_blob(&mut wire, b"abcdef", None).unwrap();
        let mut out = vec![0u8; 4]; // negotiation promised 4, frame carries 6
        assert!(recv_blob(&mut wire.as_slice(), &mut out).is_err());
    }
}
