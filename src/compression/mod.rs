//! 压缩/解压（LZ4 / None）

use crate::common::{OlapError, Result};
use crate::config::CompressionType;

pub fn compress(data: &[u8], codec: CompressionType) -> Result<Vec<u8>> {
    match codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lz4  =>
            lz4::block::compress(data, None, false)
                .map_err(|e| OlapError::Compression(e.to_string())),
    }
}

pub fn decompress(
    data:             &[u8],
    codec:            CompressionType,
    uncompressed_len: usize,
) -> Result<Vec<u8>> {
    let out = match codec {
        CompressionType::None => data.to_vec(),
        CompressionType::Lz4  => {
            let len = i32::try_from(uncompressed_len)
                .map_err(|_| OlapError::Compression(format!("block too large: {uncompressed_len}")))?;
            lz4::block::decompress(data, Some(len))
                .map_err(|e| OlapError::Compression(e.to_string()))?
        }
    };
    if out.len() != uncompressed_len {
        return Err(OlapError::Compression(format!(
            "expected {uncompressed_len} bytes, got {}", out.len(),
        )));
    }
    Ok(out)
}
