//! Gzip body compression for stored entries.

use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use super::CacheError;

pub(crate) fn compress(body: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder
        .write_all(body)
        .map_err(|err| CacheError::Compression(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| CacheError::Compression(err.to_string()))
}

pub(crate) fn decompress(payload: &[u8], expected_len: usize) -> Result<Vec<u8>, CacheError> {
    let mut decoder = GzDecoder::new(payload);
    let mut body = Vec::with_capacity(expected_len);
    decoder
        .read_to_end(&mut body)
        .map_err(|err| CacheError::Compression(err.to_string()))?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repetitive_html_shrinks() {
        let body = "<li>entry</li>".repeat(2_000);
        let packed = compress(body.as_bytes()).expect("compress");
        assert!(packed.len() < body.len() / 10);
        let unpacked = decompress(&packed, body.len()).expect("decompress");
        assert_eq!(unpacked, body.as_bytes());
    }

    #[test]
    fn garbage_is_a_compression_error() {
        let err = decompress(b"not gzip at all", 16).expect_err("invalid stream");
        assert!(matches!(err, CacheError::Compression(_)));
    }
}
