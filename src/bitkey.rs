//! BitKey：定宽位向量
//!
//! 用于表示一组列 / 度量的序号集合（星内局部位置或 Galaxy 全局序号）。
//! 按 u64 字存储；两个宽度不同的 key 做运算时，缺失的字视为 0，
//! 结果宽度取较大者。

use std::fmt;

const WORD_BITS: usize = 64;

#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BitKey {
    words: Vec<u64>,
    size:  usize,
}

impl BitKey {
    pub fn new(size: usize) -> Self {
        Self { words: vec![0u64; (size + WORD_BITS - 1) / WORD_BITS], size }
    }

    /// 由若干位置构造
    pub fn from_positions(size: usize, positions: impl IntoIterator<Item = usize>) -> Self {
        let mut key = Self::new(size);
        for p in positions {
            key.set(p);
        }
        key
    }

    pub fn size(&self) -> usize { self.size }

    /// 同宽度的空 key
    pub fn empty_copy(&self) -> Self { Self::new(self.size) }

    /// 超出宽度的位置会 panic，与切片下标一致
    pub fn set(&mut self, pos: usize) {
        assert!(pos < self.size, "bit {pos} out of range for BitKey of size {}", self.size);
        self.words[pos / WORD_BITS] |= 1u64 << (pos % WORD_BITS);
    }

    pub fn clear(&mut self, pos: usize) {
        if pos < self.size {
            self.words[pos / WORD_BITS] &= !(1u64 << (pos % WORD_BITS));
        }
    }

    pub fn get(&self, pos: usize) -> bool {
        pos < self.size && self.words[pos / WORD_BITS] & (1u64 << (pos % WORD_BITS)) != 0
    }

    pub fn is_empty(&self) -> bool { self.words.iter().all(|w| *w == 0) }

    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn zip_with(&self, other: &BitKey, f: impl Fn(u64, u64) -> u64) -> BitKey {
        let n = self.words.len().max(other.words.len());
        let words = (0..n)
            .map(|i| {
                let a = self.words.get(i).copied().unwrap_or(0);
                let b = other.words.get(i).copied().unwrap_or(0);
                f(a, b)
            })
            .collect();
        BitKey { words, size: self.size.max(other.size) }
    }

    pub fn or(&self, other: &BitKey)     -> BitKey { self.zip_with(other, |a, b| a | b) }
    pub fn and(&self, other: &BitKey)    -> BitKey { self.zip_with(other, |a, b| a & b) }
    pub fn and_not(&self, other: &BitKey) -> BitKey { self.zip_with(other, |a, b| a & !b) }

    /// self ⊇ other
    pub fn is_superset_of(&self, other: &BitKey) -> bool {
        other.words.iter().enumerate().all(|(i, b)| {
            let a = self.words.get(i).copied().unwrap_or(0);
            b & !a == 0
        })
    }

    pub fn intersects(&self, other: &BitKey) -> bool {
        self.words.iter().zip(other.words.iter()).any(|(a, b)| a & b != 0)
    }

    /// 忽略宽度差异，只比较置位集合
    pub fn same_bits(&self, other: &BitKey) -> bool {
        self.is_superset_of(other) && other.is_superset_of(self)
    }

    /// 升序遍历已置位的位置
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            let mut rest = w;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let tz = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(wi * WORD_BITS + tz)
            })
        })
    }
}

impl fmt::Display for BitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, pos) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{pos}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for BitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitKey{}/{}", self, self.size)
    }
}
