//! Modulos：单元格序号 ↔ 各轴位置
//!
//! 由各轴长度推导：`modulo[0] = 1`，`modulo[i+1] = modulo[i] * length[i]`。
//! 第 0 轴变化最快（与 segment 中 "最后一轴最快" 的 axis multiplier 方向相反）。
//!
//! ```text
//!   pos[i]  = (ordinal % modulo[i+1]) / modulo[i]
//!   ordinal = Σ pos[i] * modulo[i]
//! ```

use crate::cell_key::CellKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modulos {
    Zero,
    /// modulo = [1, m1]
    One   { m1: usize },
    Two   { m1: usize, m2: usize },
    Three { m1: usize, m2: usize, m3: usize },
    /// 通用：modulos.len() == 轴数 + 1
    Many  { modulos: Vec<usize> },
}

impl Modulos {
    /// 按轴数选择变体
    pub fn create(axis_lengths: &[usize]) -> Self {
        match *axis_lengths {
            []          => Self::Zero,
            [a]         => Self::One { m1: a },
            [a, b]      => Self::Two { m1: a, m2: a * b },
            [a, b, c]   => Self::Three { m1: a, m2: a * b, m3: a * b * c },
            _ => {
                let mut modulos = Vec::with_capacity(axis_lengths.len() + 1);
                modulos.push(1usize);
                for len in axis_lengths {
                    let last = *modulos.last().unwrap_or(&1);
                    modulos.push(last * len);
                }
                Self::Many { modulos }
            }
        }
    }

    pub fn axis_count(&self) -> usize {
        match self {
            Self::Zero          => 0,
            Self::One { .. }    => 1,
            Self::Two { .. }    => 2,
            Self::Three { .. }  => 3,
            Self::Many { modulos } => modulos.len() - 1,
        }
    }

    /// 单元格总数 = modulo[N]
    pub fn total_cells(&self) -> usize {
        match *self {
            Self::Zero                   => 1,
            Self::One { m1 }             => m1,
            Self::Two { m2, .. }         => m2,
            Self::Three { m3, .. }       => m3,
            Self::Many { ref modulos }   => *modulos.last().unwrap_or(&1),
        }
    }

    pub fn modulo(&self, i: usize) -> usize {
        match (self, i) {
            (_, 0)                            => 1,
            (Self::One { m1 }, 1)             => *m1,
            (Self::Two { m1, .. }, 1)         => *m1,
            (Self::Two { m2, .. }, 2)         => *m2,
            (Self::Three { m1, .. }, 1)       => *m1,
            (Self::Three { m2, .. }, 2)       => *m2,
            (Self::Three { m3, .. }, 3)       => *m3,
            (Self::Many { modulos }, i) if i < modulos.len() => modulos[i],
            _ => panic!("modulo index {i} out of range for {} axes", self.axis_count()),
        }
    }

    pub fn cell_pos(&self, ordinal: usize) -> Vec<usize> {
        let mut pos = vec![0usize; self.axis_count()];
        self.cell_pos_into(ordinal, &mut pos);
        pos
    }

    /// 复用调用方缓冲区；`pos.len()` 必须等于轴数
    pub fn cell_pos_into(&self, ordinal: usize, pos: &mut [usize]) {
        assert_eq!(pos.len(), self.axis_count(), "position buffer has wrong length");
        match *self {
            Self::Zero => {}
            Self::One { m1 } => {
                pos[0] = ordinal % m1;
            }
            Self::Two { m1, m2 } => {
                pos[0] = ordinal % m1;
                pos[1] = (ordinal % m2) / m1;
            }
            Self::Three { m1, m2, m3 } => {
                pos[0] = ordinal % m1;
                pos[1] = (ordinal % m2) / m1;
                pos[2] = (ordinal % m3) / m2;
            }
            Self::Many { ref modulos } => {
                for (i, p) in pos.iter_mut().enumerate() {
                    *p = (ordinal % modulos[i + 1]) / modulos[i];
                }
            }
        }
    }

    pub fn cell_ordinal(&self, pos: &[usize]) -> usize {
        match *self {
            Self::Zero                  => 0,
            Self::One { .. }            => pos[0],
            Self::Two { m1, .. }        => pos[0] + pos[1] * m1,
            Self::Three { m1, m2, .. }  => pos[0] + pos[1] * m1 + pos[2] * m2,
            Self::Many { ref modulos }  => {
                pos.iter().zip(modulos.iter()).map(|(p, m)| p * m).sum()
            }
        }
    }

    pub fn cell_ordinal_of_key(&self, key: &CellKey) -> usize {
        self.cell_ordinal(key.ordinals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn variant_by_axis_count() {
        assert_eq!(Modulos::create(&[]), Modulos::Zero);
        assert_eq!(Modulos::create(&[4]), Modulos::One { m1: 4 });
        assert_eq!(Modulos::create(&[2, 3]), Modulos::Two { m1: 2, m2: 6 });
        assert_eq!(
            Modulos::create(&[2, 3, 4, 5]),
            Modulos::Many { modulos: vec![1, 2, 6, 24, 120] }
        );
    }

    #[test]
    fn exact_index_arithmetic() {
        let m = Modulos::create(&[2, 3, 4]);
        assert_eq!(m.total_cells(), 24);
        // 13 = 1 + 0*2 + 2*6
        assert_eq!(m.cell_pos(13), vec![1, 0, 2]);
        assert_eq!(m.cell_ordinal(&[1, 0, 2]), 13);
        assert_eq!(m.modulo(2), 6);
    }

    #[test]
    fn out_of_range_ordinal_wraps_on_every_arity() {
        assert_eq!(Modulos::create(&[4]).cell_pos(9), vec![1]);
        assert_eq!(Modulos::create(&[4, 2]).cell_pos(9), vec![1, 0]);
        assert_eq!(Modulos::create(&[4, 2, 1, 1]).cell_pos(9), vec![1, 0, 0, 0]);
    }

    #[test]
    fn many_agrees_with_three() {
        let three = Modulos::create(&[3, 5, 7]);
        let many  = Modulos::Many { modulos: vec![1, 3, 15, 105] };
        for ord in 0..three.total_cells() {
            assert_eq!(three.cell_pos(ord), many.cell_pos(ord));
        }
    }

    #[test]
    fn zero_axes_single_cell() {
        let m = Modulos::create(&[]);
        assert_eq!(m.cell_pos(0), Vec::<usize>::new());
        assert_eq!(m.cell_ordinal(&[]), 0);
    }

    proptest! {
        #[test]
        fn ordinal_pos_bijection(
            lengths in prop::collection::vec(1usize..6, 0..7),
            seed in any::<usize>(),
        ) {
            let m = Modulos::create(&lengths);
            let total = m.total_cells();
            let ordinal = seed % total;
            let pos = m.cell_pos(ordinal);
            for (p, len) in pos.iter().zip(&lengths) {
                prop_assert!(p < len);
            }
            prop_assert_eq!(m.cell_ordinal(&pos), ordinal);
            prop_assert_eq!(m.cell_ordinal_of_key(&CellKey::from_ordinals(&pos)), ordinal);
        }
    }
}
