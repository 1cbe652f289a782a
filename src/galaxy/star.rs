//! 星型模型元数据（由外部 schema 加载器解析后交给 Galaxy）
//!
//! 一个 Star = 一张事实表或聚合表 + 它直接或间接 join 的维表。
//! 列的局部 bit 位置按加入顺序分配。

use std::fmt;
use crate::common::LocalOrdinal;

// ── 物理表达式 ────────────────────────────────────────────────────────────────

/// 列的物理身份；不同星中表达式相同的列视为等价
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnExpr {
    Column { table: String, column: String },
    Calculated(String),
}

impl ColumnExpr {
    pub fn column(table: &str, column: &str) -> Self {
        Self::Column { table: table.into(), column: column.into() }
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { table, column } => write!(f, "{table}.{column}"),
            Self::Calculated(sql)          => write!(f, "({sql})"),
        }
    }
}

// ── 聚合器 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregator {
    Sum,
    Count,
    Min,
    Max,
    Avg,
    DistinctCount,
}

impl Aggregator {
    /// 不能直接由部分聚合结果再聚合
    pub fn is_distinct(self) -> bool {
        matches!(self, Self::DistinctCount)
    }
}

/// 引用另一个度量组中定义的度量
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeasureRef {
    pub group:   String,
    pub measure: String,
}

impl MeasureRef {
    pub fn new(group: &str, measure: &str) -> Self {
        Self { group: group.into(), measure: measure.into() }
    }
}

// ── 列 / 表 ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// 维度 / level 列
    Level,
    /// `base` 非空时，本列是某个基础度量的拷贝，身份按基础度量解析
    Measure {
        name:       String,
        aggregator: Aggregator,
        base:       Option<MeasureRef>,
    },
    /// 聚合表从别处拷贝来的维度列，在全局序号阶段按 `source` 延迟解析
    CopyLink { source: ColumnExpr },
}

#[derive(Debug, Clone)]
pub struct StarColumn {
    pub bit_position: LocalOrdinal,
    pub table:        String,
    pub expr:         ColumnExpr,
    pub kind:         ColumnKind,
}

impl StarColumn {
    pub fn is_measure(&self) -> bool { matches!(self.kind, ColumnKind::Measure { .. }) }

    pub fn measure_name(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Measure { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StarTable {
    pub alias:       String,
    pub parent:      Option<String>,
    /// 父表中指向本表的外键
    pub foreign_key: Option<ColumnExpr>,
    /// 本表主键
    pub key:         Option<ColumnExpr>,
}

// ── Star ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Star {
    alias:       String,
    cost:        u64,
    grain_unique: bool,
    tables:      Vec<StarTable>,
    columns:     Vec<StarColumn>,
}

impl Star {
    /// 事实表：行与 level 组合不是一一对应
    pub fn fact(alias: &str, cost: u64) -> Self {
        Self::with_root(alias, cost, false)
    }

    /// 聚合表：每个 level 组合一行
    pub fn aggregate(alias: &str, cost: u64) -> Self {
        Self::with_root(alias, cost, true)
    }

    fn with_root(alias: &str, cost: u64, grain_unique: bool) -> Self {
        let root = StarTable { alias: alias.into(), parent: None, foreign_key: None, key: None };
        Self { alias: alias.into(), cost, grain_unique, tables: vec![root], columns: Vec::new() }
    }

    /// 挂一张维表：`parent.foreign_key = alias.key`
    pub fn join(mut self, alias: &str, parent: &str, foreign_key: ColumnExpr, key: ColumnExpr) -> Self {
        self.tables.push(StarTable {
            alias:       alias.into(),
            parent:      Some(parent.into()),
            foreign_key: Some(foreign_key),
            key:         Some(key),
        });
        self
    }

    fn push(mut self, table: &str, expr: ColumnExpr, kind: ColumnKind) -> Self {
        let bit_position = self.columns.len();
        self.columns.push(StarColumn { bit_position, table: table.into(), expr, kind });
        self
    }

    pub fn level(self, table: &str, column: &str) -> Self {
        self.push(table, ColumnExpr::column(table, column), ColumnKind::Level)
    }

    pub fn measure(self, table: &str, name: &str, aggregator: Aggregator, column: &str) -> Self {
        let kind = ColumnKind::Measure { name: name.into(), aggregator, base: None };
        self.push(table, ColumnExpr::column(table, column), kind)
    }

    pub fn measure_ref(
        self,
        table:      &str,
        name:       &str,
        aggregator: Aggregator,
        column:     &str,
        base:       MeasureRef,
    ) -> Self {
        let kind = ColumnKind::Measure { name: name.into(), aggregator, base: Some(base) };
        self.push(table, ColumnExpr::column(table, column), kind)
    }

    pub fn copy_link(self, table: &str, column: &str, source: ColumnExpr) -> Self {
        self.push(table, ColumnExpr::column(table, column), ColumnKind::CopyLink { source })
    }

    // ── 访问 ──────────────────────────────────────────────────────────────────

    pub fn alias(&self)        -> &str          { &self.alias }
    pub fn cost(&self)         -> u64           { self.cost }
    pub fn grain_unique(&self) -> bool          { self.grain_unique }
    pub fn tables(&self)       -> &[StarTable]  { &self.tables }
    pub fn columns(&self)      -> &[StarColumn] { &self.columns }

    pub fn column(&self, pos: LocalOrdinal) -> Option<&StarColumn> { self.columns.get(pos) }

    pub fn find_measure(&self, name: &str) -> Option<&StarColumn> {
        self.columns.iter().find(|c| c.measure_name() == Some(name))
    }

    pub fn find_level(&self, table: &str, column: &str) -> Option<&StarColumn> {
        let expr = ColumnExpr::column(table, column);
        self.columns.iter().find(|c| !c.is_measure() && c.expr == expr)
    }

    /// 与 `expr` 函数依赖的表：以 `expr` 为外键 join 进来的表、以 `expr` 为主键的表，
    /// 以及它们之下的全部子表
    pub fn tables_below(&self, expr: &ColumnExpr) -> Vec<&str> {
        let mut found: Vec<&str> = self.tables.iter()
            .filter(|t| t.foreign_key.as_ref() == Some(expr) || t.key.as_ref() == Some(expr))
            .map(|t| t.alias.as_str())
            .collect();
        let mut i = 0;
        while i < found.len() {
            let cur = found[i];
            for t in &self.tables {
                if t.parent.as_deref() == Some(cur) && !found.contains(&t.alias.as_str()) {
                    found.push(&t.alias);
                }
            }
            i += 1;
        }
        found
    }
}
