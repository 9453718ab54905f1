//! Local DEFLATE and CRC-32 primitives.
//!
//! ZIP stores raw deflate streams (no zlib header), so these wrap
//! `flate2`'s raw `DeflateEncoder`/`DeflateDecoder`.

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

use crate::error::{Error, Result};

use super::structures::CompressionMethod;

/// Compute the CRC32 (IEEE) of a byte slice.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Inflate a raw deflate stream.
///
/// Output is capped one byte past `expected_len`, so a stream that inflates
/// beyond its declared size fails with [`Error::MalformedArchive`] without
/// being decoded in full. The caller still verifies the CRC.
pub fn inflate(path: &str, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    DeflateDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Deflate {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    if out.len() > expected_len {
        return Err(Error::MalformedArchive(format!(
            "{} declares {} bytes but inflates to more",
            path, expected_len
        )));
    }
    Ok(out)
}

/// Deflate `data` at `level` (0-9) into a raw deflate stream.
pub fn deflate(path: &str, data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(data.len() / 2),
        Compression::new(level.min(9)),
    );
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| Error::Deflate {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

/// Decode a payload according to its declared method.
pub fn decode(
    path: &str,
    method: CompressionMethod,
    payload: &[u8],
    uncompressed_size: usize,
) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(payload.to_vec()),
        CompressionMethod::Deflate => inflate(path, payload, uncompressed_size),
        CompressionMethod::Unknown(m) => Err(Error::UnsupportedCompression(m)),
    }
}

/// Pick the cheapest legal encoding for `data`.
///
/// Level 0 and empty payloads are stored; deflate output that is not smaller
/// than the input also falls back to stored.
pub fn encode(path: &str, data: &[u8], level: u32) -> Result<(CompressionMethod, Vec<u8>)> {
    if level == 0 || data.is_empty() {
        return Ok((CompressionMethod::Stored, data.to_vec()));
    }
    let compressed = deflate(path, data, level)?;
    if compressed.len() >= data.len() {
        Ok((CompressionMethod::Stored, data.to_vec()))
    } else {
        Ok((CompressionMethod::Deflate, compressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_known_value() {
        assert_eq!(crc32(b"Hello World!"), 0x1C291CA3);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_deflate_inflate() {
        let text = "<a:theme>".repeat(200);
        let packed = deflate("t.xml", text.as_bytes(), 6).unwrap();
        assert!(packed.len() < text.len());
        let unpacked = inflate("t.xml", &packed, text.len()).unwrap();
        assert_eq!(unpacked, text.as_bytes());
    }

    #[test]
    fn test_encode_falls_back_to_stored() {
        let (method, bytes) = encode("x", b"ab", 9).unwrap();
        assert_eq!(method, CompressionMethod::Stored);
        assert_eq!(bytes, b"ab");

        let (method, _) = encode("x", &[b'z'; 4096], 0).unwrap();
        assert_eq!(method, CompressionMethod::Stored);

        let (method, _) = encode("x", &[b'z'; 4096], 6).unwrap();
        assert_eq!(method, CompressionMethod::Deflate);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = decode("x", CompressionMethod::Unknown(14), b"", 0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompression(14)));
    }

    #[test]
    fn test_inflate_stops_at_declared_size() {
        let zeros = vec![0u8; 4 * 1024 * 1024];
        let packed = deflate("bomb.xml", &zeros, 9).unwrap();
        let err = inflate("bomb.xml", &packed, 12).unwrap_err();
        assert_eq!(err.code(), "ZIP_MALFORMED");

        let exact = inflate("bomb.xml", &packed, zeros.len()).unwrap();
        assert_eq!(exact.len(), zeros.len());
    }

    #[test]
    fn test_garbage_deflate_stream() {
        let err = inflate("bad.bin", &[0xFF, 0xFF, 0xFF, 0xFF], 10).unwrap_err();
        assert_eq!(err.code(), "ZIP_DEFLATE");
    }
}
