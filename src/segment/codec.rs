//! Segment body 的二进制序列化
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ MAGIC        (8 bytes) "RSEGBODY"    │
//! │ version      (u32 LE) = 1            │
//! │ kind         (u8)  0=dense 1=sparse  │
//! │ compression  (u8)  0=none  1=lz4     │
//! │ axis_count   (u32 LE)                │
//! │ axis_lengths (u64 LE × axis_count)   │
//! │ uncomp_size  (u32 LE)                │
//! │ payload      (compressed)            │
//! │ CRC32        (u32 LE)                │
//! └──────────────────────────────────────┘
//! ```
//!
//! payload：
//! - dense：cell 总数个 f64 + 存在位图（bit-packed，每字节低位在前）
//! - sparse：entry 数 (u64) + 每条 (ordinal u64 × axis_count, f64)，按行主序

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::cell_key::CellKey;
use crate::common::{OlapError, Result};
use crate::compression;
use crate::config::CompressionType;
use super::{DenseDataset, SegmentDataset, SparseDataset};

const MAGIC: &[u8; 8] = b"RSEGBODY";
const VERSION: u32     = 1;

const KIND_DENSE:  u8 = 0;
const KIND_SPARSE: u8 = 1;

/// header 固定部分 + CRC
const MIN_LEN: usize = 8 + 4 + 1 + 1 + 4 + 4 + 4;

fn io_err(e: io::Error) -> OlapError {
    OlapError::Codec(e.to_string())
}

pub struct SegmentBody;

impl SegmentBody {
    pub fn encode(dataset: &SegmentDataset, compression: CompressionType) -> Result<Vec<u8>> {
        let axes = dataset.axis_lengths();
        let (kind, raw) = match dataset {
            SegmentDataset::Dense(d)  => (KIND_DENSE, encode_dense(d).map_err(io_err)?),
            SegmentDataset::Sparse(_) => (KIND_SPARSE, encode_sparse(dataset).map_err(io_err)?),
        };
        let uncomp_size = u32::try_from(raw.len())
            .map_err(|_| OlapError::Codec(format!("segment payload too large: {} bytes", raw.len())))?;
        let packed = compression::compress(&raw, compression)?;

        let mut out = Vec::with_capacity(MIN_LEN + axes.len() * 8 + packed.len());
        out.extend_from_slice(MAGIC);
        out.write_u32::<LittleEndian>(VERSION).map_err(io_err)?;
        out.write_u8(kind).map_err(io_err)?;
        out.write_u8(compression.tag()).map_err(io_err)?;
        out.write_u32::<LittleEndian>(axes.len() as u32).map_err(io_err)?;
        for &len in axes {
            out.write_u64::<LittleEndian>(len as u64).map_err(io_err)?;
        }
        out.write_u32::<LittleEndian>(uncomp_size).map_err(io_err)?;
        out.extend_from_slice(&packed);

        let crc = crc32fast::hash(&out);
        out.write_u32::<LittleEndian>(crc).map_err(io_err)?;
        debug!(
            kind, cells = dataset.cell_count(), raw = raw.len(), bytes = out.len(),
            "segment body encoded"
        );
        Ok(out)
    }

    pub fn decode(data: &[u8]) -> Result<SegmentDataset> {
        if data.len() < MIN_LEN {
            return Err(OlapError::Codec(format!("segment body too short: {} bytes", data.len())));
        }
        if &data[..8] != MAGIC {
            return Err(OlapError::Codec("bad segment body magic".into()));
        }
        let body_end = data.len() - 4;
        let mut trailer = &data[body_end..];
        let stored_crc = trailer.read_u32::<LittleEndian>().map_err(io_err)?;
        if stored_crc != crc32fast::hash(&data[..body_end]) {
            return Err(OlapError::ChecksumMismatch);
        }

        let mut r = &data[8..body_end];
        let version = r.read_u32::<LittleEndian>().map_err(io_err)?;
        if version != VERSION {
            return Err(OlapError::Codec(format!("unsupported segment body version {version}")));
        }
        let kind = r.read_u8().map_err(io_err)?;
        let tag  = r.read_u8().map_err(io_err)?;
        let compression = CompressionType::from_tag(tag)
            .ok_or_else(|| OlapError::Codec(format!("unknown compression tag {tag}")))?;
        let axis_count = r.read_u32::<LittleEndian>().map_err(io_err)? as usize;
        let mut axes = Vec::with_capacity(axis_count.min(64));
        for _ in 0..axis_count {
            let len = r.read_u64::<LittleEndian>().map_err(io_err)?;
            axes.push(usize::try_from(len).map_err(|_| OlapError::Codec(format!("axis length {len}")))?);
        }
        let uncomp_size = r.read_u32::<LittleEndian>().map_err(io_err)? as usize;
        let raw = compression::decompress(r, compression, uncomp_size)?;

        match kind {
            KIND_DENSE  => decode_dense(&axes, &raw),
            KIND_SPARSE => decode_sparse(&axes, &raw),
            other => Err(OlapError::Codec(format!("unknown segment kind {other}"))),
        }
    }
}

// ── dense ─────────────────────────────────────────────────────────────────────

fn encode_dense(d: &DenseDataset) -> io::Result<Vec<u8>> {
    let n = d.total_cells();
    let mut out = Vec::with_capacity(n * 8 + n.div_ceil(8));
    for &v in &d.values {
        out.write_f64::<LittleEndian>(v)?;
    }
    let mut bitmap = vec![0u8; n.div_ceil(8)];
    for off in d.present.iter() {
        bitmap[off / 8] |= 1 << (off % 8);
    }
    out.extend_from_slice(&bitmap);
    Ok(out)
}

fn decode_dense(axes: &[usize], raw: &[u8]) -> Result<SegmentDataset> {
    let total = axes.iter()
        .try_fold(1usize, |acc, &len| acc.checked_mul(len))
        .ok_or_else(|| OlapError::Codec(format!("dense axes {axes:?} overflow")))?;
    let expected = total.checked_mul(8)
        .and_then(|b| b.checked_add(total.div_ceil(8)))
        .ok_or_else(|| OlapError::Codec(format!("dense axes {axes:?} overflow")))?;
    if raw.len() != expected {
        return Err(OlapError::Codec(format!(
            "dense payload is {} bytes, expected {} cells", raw.len(), total,
        )));
    }
    let mut d = DenseDataset::new(axes);
    let mut r = &raw[..total * 8];
    for v in d.values.iter_mut() {
        *v = r.read_f64::<LittleEndian>().map_err(io_err)?;
    }
    let bitmap = &raw[total * 8..];
    for off in 0..total {
        if bitmap[off / 8] & (1 << (off % 8)) != 0 {
            d.present.set(off);
        }
    }
    Ok(SegmentDataset::Dense(d))
}

// ── sparse ────────────────────────────────────────────────────────────────────

fn encode_sparse(dataset: &SegmentDataset) -> io::Result<Vec<u8>> {
    let cells = dataset.cells();
    let mut out = Vec::new();
    out.write_u64::<LittleEndian>(cells.len() as u64)?;
    for (key, value) in &cells {
        for &ord in key.ordinals() {
            out.write_u64::<LittleEndian>(ord as u64)?;
        }
        out.write_f64::<LittleEndian>(*value)?;
    }
    Ok(out)
}

fn decode_sparse(axes: &[usize], raw: &[u8]) -> Result<SegmentDataset> {
    let mut r = raw;
    let count = r.read_u64::<LittleEndian>().map_err(io_err)?;
    let mut s = SparseDataset::new(axes);
    let mut ordinals = vec![0usize; axes.len()];
    for _ in 0..count {
        for (axis, slot) in ordinals.iter_mut().enumerate() {
            let ord = r.read_u64::<LittleEndian>().map_err(io_err)? as usize;
            if ord >= axes[axis] {
                return Err(OlapError::Codec(format!(
                    "sparse cell ordinal {ord} exceeds axis {axis} length {}", axes[axis],
                )));
            }
            *slot = ord;
        }
        let value = r.read_f64::<LittleEndian>().map_err(io_err)?;
        s.cells.insert(CellKey::from_ordinals(&ordinals), value);
    }
    let mut rest = Vec::new();
    r.read_to_end(&mut rest).map_err(io_err)?;
    if !rest.is_empty() {
        return Err(OlapError::Codec(format!("{} trailing bytes after sparse cells", rest.len())));
    }
    Ok(SegmentDataset::Sparse(s))
}
