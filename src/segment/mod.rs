//! Segment 数据集：按 CellKey 寻址的单元格值
//!
//! - Dense：平铺 `Vec<f64>` + 存在位图，offset = Σ ordinal[i] * multiplier[i]，最后一个轴变化最快
//! - Sparse：`HashMap<CellKey, f64>`，只存有值的单元格
//!
//! 选择规则：`(possible - count_threshold) * density_threshold > actual` 时用稀疏。

pub mod codec;

pub use codec::SegmentBody;

use std::collections::HashMap;

use tracing::trace;

use crate::bitkey::BitKey;
use crate::cell_key::CellKey;
use crate::config::EngineConfig;

// ── Dense ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DenseDataset {
    axis_lengths: Vec<usize>,
    multipliers:  Vec<usize>,
    values:       Vec<f64>,
    /// 置位 = 该单元格有值
    present:      BitKey,
}

impl DenseDataset {
    pub fn new(axis_lengths: &[usize]) -> Self {
        let mut multipliers = vec![1usize; axis_lengths.len()];
        for i in (0..axis_lengths.len().saturating_sub(1)).rev() {
            multipliers[i] = multipliers[i + 1] * axis_lengths[i + 1];
        }
        let total: usize = axis_lengths.iter().product();
        Self {
            axis_lengths: axis_lengths.to_vec(),
            multipliers,
            values:       vec![0.0; total],
            present:      BitKey::new(total),
        }
    }

    pub fn multipliers(&self) -> &[usize] { &self.multipliers }

    pub fn total_cells(&self) -> usize { self.values.len() }

    fn offset(&self, key: &CellKey) -> usize {
        check_bounds(&self.axis_lengths, key);
        key.offset(&self.multipliers)
    }

    fn key_at(&self, mut offset: usize) -> CellKey {
        let mut key = CellKey::new(self.axis_lengths.len());
        for (axis, m) in self.multipliers.iter().enumerate() {
            key.set_axis(axis, offset / m);
            offset %= m;
        }
        key
    }
}

// ── Sparse ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SparseDataset {
    axis_lengths: Vec<usize>,
    cells:        HashMap<CellKey, f64>,
}

impl SparseDataset {
    pub fn new(axis_lengths: &[usize]) -> Self {
        Self { axis_lengths: axis_lengths.to_vec(), cells: HashMap::new() }
    }
}

fn check_bounds(axis_lengths: &[usize], key: &CellKey) {
    assert_eq!(
        key.size(), axis_lengths.len(),
        "cell key {key} has {} axes, segment has {}", key.size(), axis_lengths.len(),
    );
    for (axis, (&ord, &len)) in key.ordinals().iter().zip(axis_lengths).enumerate() {
        assert!(ord < len, "cell key {key}: axis {axis} ordinal {ord} out of bounds (length {len})");
    }
}

// ── SegmentDataset ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SegmentDataset {
    Dense(DenseDataset),
    Sparse(SparseDataset),
}

impl SegmentDataset {
    /// 按预计单元格数和配置阈值选择稠密或稀疏
    pub fn choose(axis_lengths: &[usize], expected_cells: usize, cfg: &EngineConfig) -> Self {
        let possible = axis_lengths.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len));
        let sparse = match possible {
            // 乘积溢出，稠密数组不可能分配
            None => true,
            Some(possible) => {
                (possible as f64 - cfg.sparse_segment_count_threshold as f64)
                    * cfg.sparse_segment_density_threshold
                    > expected_cells as f64
            }
        };
        trace!(?axis_lengths, ?possible, expected_cells, sparse, "segment dataset chosen");
        if sparse {
            Self::Sparse(SparseDataset::new(axis_lengths))
        } else {
            Self::Dense(DenseDataset::new(axis_lengths))
        }
    }

    pub fn is_sparse(&self) -> bool { matches!(self, Self::Sparse(_)) }

    pub fn axis_lengths(&self) -> &[usize] {
        match self {
            Self::Dense(d)  => &d.axis_lengths,
            Self::Sparse(s) => &s.axis_lengths,
        }
    }

    /// 写入单元格，返回旧值；key 越界会 panic
    pub fn put(&mut self, key: &CellKey, value: f64) -> Option<f64> {
        match self {
            Self::Dense(d) => {
                let off = d.offset(key);
                let old = d.present.get(off).then(|| d.values[off]);
                d.values[off] = value;
                d.present.set(off);
                old
            }
            Self::Sparse(s) => {
                check_bounds(&s.axis_lengths, key);
                s.cells.insert(key.clone(), value)
            }
        }
    }

    pub fn get(&self, key: &CellKey) -> Option<f64> {
        match self {
            Self::Dense(d) => {
                let off = d.offset(key);
                d.present.get(off).then(|| d.values[off])
            }
            Self::Sparse(s) => {
                check_bounds(&s.axis_lengths, key);
                s.cells.get(key).copied()
            }
        }
    }

    /// 有值单元格个数
    pub fn cell_count(&self) -> usize {
        match self {
            Self::Dense(d)  => d.present.cardinality(),
            Self::Sparse(s) => s.cells.len(),
        }
    }

    /// 所有有值单元格，按行主序（最后一个轴最快）排列
    pub fn cells(&self) -> Vec<(CellKey, f64)> {
        match self {
            Self::Dense(d) => d.present.iter().map(|off| (d.key_at(off), d.values[off])).collect(),
            Self::Sparse(s) => {
                let mut out: Vec<_> = s.cells.iter().map(|(k, v)| (k.clone(), *v)).collect();
                out.sort_by(|a, b| a.0.ordinals().cmp(b.0.ordinals()));
                out
            }
        }
    }
}
