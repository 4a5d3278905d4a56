//! Payload compression codecs
//!
//! Dispatches on [`CompressionType`]: LZ4 block compression in fast or
//! high-compression mode, gzip streams, or a plain copy. Records compress
//! their event payload as a single unit, so the API is one-shot.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lz4::block::{self, CompressionMode};

use crate::error::{EvioError, Result};
use crate::format::CompressionType;

/// LZ4 high-compression level used for [`CompressionType::Lz4Best`]
const LZ4_BEST_LEVEL: i32 = 9;

/// Gzip level used for [`CompressionType::Gzip`]
const GZIP_LEVEL: u32 = 6;

/// Compress `src` as one unit
pub fn compress(ctype: CompressionType, src: &[u8]) -> Result<Vec<u8>> {
    match ctype {
        CompressionType::None => Ok(src.to_vec()),
        CompressionType::Lz4 => block::compress(src, Some(CompressionMode::DEFAULT), false)
            .map_err(|e| EvioError::Codec(format!("LZ4: {e}"))),
        CompressionType::Lz4Best => block::compress(
            src,
            Some(CompressionMode::HIGHCOMPRESSION(LZ4_BEST_LEVEL)),
            false,
        )
        .map_err(|e| EvioError::Codec(format!("LZ4-HC: {e}"))),
        CompressionType::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL));
            encoder
                .write_all(src)
                .and_then(|()| encoder.finish())
                .map_err(|e| EvioError::Codec(format!("gzip: {e}")))
        }
    }
}

/// Decompress `src`, which must expand to exactly `uncompressed_len` bytes
pub fn decompress(ctype: CompressionType, src: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    let out = match ctype {
        CompressionType::None => src[..uncompressed_len.min(src.len())].to_vec(),
        CompressionType::Lz4 | CompressionType::Lz4Best => {
            block::decompress(src, Some(uncompressed_len as i32))
                .map_err(|e| EvioError::Codec(format!("LZ4: {e}")))?
        }
        CompressionType::Gzip => {
            let mut decoder = GzDecoder::new(src);
            let mut out = Vec::with_capacity(uncompressed_len);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| EvioError::Codec(format!("gzip: {e}")))?;
            out
        }
    };

    if out.len() != uncompressed_len {
        return Err(EvioError::Codec(format!(
            "decompressed size mismatch: expected {uncompressed_len}, got {}",
            out.len()
        )));
    }
    Ok(out)
}
