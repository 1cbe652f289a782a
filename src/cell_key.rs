//! CellKey：N 维坐标元组
//!
//! 每个轴一个非负序号。0–4 维用定长数组内联存储（避免堆分配），
//! 更高维度退化为 `Many(Box<[usize]>)`。维度在构造时确定，之后不变。
//!
//! ```text
//!   axes = {2, 5, 10}     multipliers = {50, 10, 1}
//!   CellKey(2, 3, 4).offset(multipliers) = 2*50 + 3*10 + 4*1 = 134
//! ```
//!
//! 相等 / 哈希按序号元组结构化比较，与内部选用哪种变体无关。

use std::fmt;
use std::hash::{Hash, Hasher};
use crate::common::{OlapError, Result};

#[derive(Clone)]
pub enum CellKey {
    Zero,
    One([usize; 1]),
    Two([usize; 2]),
    Three([usize; 3]),
    Four([usize; 4]),
    Many(Box<[usize]>),
}

impl CellKey {
    // ── 构造 ──────────────────────────────────────────────────────────────────

    /// 全 0 的 key，按维度选择变体
    pub fn new(size: usize) -> Self {
        match size {
            0 => Self::Zero,
            1 => Self::One([0; 1]),
            2 => Self::Two([0; 2]),
            3 => Self::Three([0; 3]),
            4 => Self::Four([0; 4]),
            n => Self::Many(vec![0; n].into_boxed_slice()),
        }
    }

    pub fn from_ordinals(ordinals: &[usize]) -> Self {
        match *ordinals {
            []               => Self::Zero,
            [a]              => Self::One([a]),
            [a, b]           => Self::Two([a, b]),
            [a, b, c]        => Self::Three([a, b, c]),
            [a, b, c, d]     => Self::Four([a, b, c, d]),
            _                => Self::Many(ordinals.into()),
        }
    }

    /// 强制使用通用变体（任意维度）
    pub fn many(ordinals: &[usize]) -> Self {
        Self::Many(ordinals.into())
    }

    // ── 访问 ──────────────────────────────────────────────────────────────────

    pub fn ordinals(&self) -> &[usize] {
        match self {
            Self::Zero     => &[],
            Self::One(a)   => a,
            Self::Two(a)   => a,
            Self::Three(a) => a,
            Self::Four(a)  => a,
            Self::Many(a)  => a,
        }
    }

    fn ordinals_mut(&mut self) -> &mut [usize] {
        match self {
            Self::Zero     => &mut [],
            Self::One(a)   => a,
            Self::Two(a)   => a,
            Self::Three(a) => a,
            Self::Four(a)  => a,
            Self::Many(a)  => a,
        }
    }

    pub fn size(&self) -> usize { self.ordinals().len() }

    /// # Panics
    /// `axis >= size()`
    pub fn axis(&self, axis: usize) -> usize {
        let size = self.size();
        *self.ordinals().get(axis)
            .unwrap_or_else(|| panic!("axis {axis} out of bounds for CellKey of size {size}"))
    }

    /// # Panics
    /// `axis >= size()`
    pub fn set_axis(&mut self, axis: usize, value: usize) {
        let size = self.size();
        let slot = self.ordinals_mut().get_mut(axis)
            .unwrap_or_else(|| panic!("axis {axis} out of bounds for CellKey of size {size}"));
        *slot = value;
    }

    /// # Panics
    /// `ordinals.len() != size()`
    pub fn set_ordinals(&mut self, ordinals: &[usize]) {
        if let Err(e) = self.try_set_ordinals(ordinals) {
            panic!("{e}");
        }
    }

    pub fn try_set_ordinals(&mut self, ordinals: &[usize]) -> Result<()> {
        if ordinals.len() != self.size() {
            return Err(OlapError::ContractViolation(format!(
                "CellKey of size {} cannot take {} ordinals", self.size(), ordinals.len(),
            )));
        }
        self.ordinals_mut().copy_from_slice(ordinals);
        Ok(())
    }

    /// Σ ordinal[i] * multipliers[i]；调用方保证 `multipliers.len() >= size()`
    pub fn offset(&self, multipliers: &[usize]) -> usize {
        match self {
            Self::Zero     => 0,
            Self::One(a)   => a[0] * multipliers[0],
            Self::Two(a)   => a[0] * multipliers[0] + a[1] * multipliers[1],
            Self::Three(a) => a[0] * multipliers[0] + a[1] * multipliers[1] + a[2] * multipliers[2],
            Self::Four(a)  => {
                a[0] * multipliers[0] + a[1] * multipliers[1]
                    + a[2] * multipliers[2] + a[3] * multipliers[3]
            }
            Self::Many(a)  => a.iter().zip(multipliers).map(|(o, m)| o * m).sum(),
        }
    }
}

impl PartialEq for CellKey {
    fn eq(&self, other: &Self) -> bool { self.ordinals() == other.ordinals() }
}

impl Eq for CellKey {}

impl Hash for CellKey {
    fn hash<H: Hasher>(&self, state: &mut H) { self.ordinals().hash(state); }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, o) in self.ordinals().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{o}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellKey{self}")
    }
}
