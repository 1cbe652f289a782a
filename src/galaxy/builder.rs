//! Galaxy 构建
//!
//! 1. 按事实表把度量组归并成 StarInfo
//! 2. 为每个物理列 / 度量三元组分配全局序号；CopyLink 列先跳过，
//!    再用 worklist 反复解析，直到一轮没有新增映射
//! 3. 构建每个星的 measure / level BitKey；对 distinct 类度量计算可安全上卷的列集合
//! 4. 按 (cost, alias) 排序

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::bitkey::BitKey;
use crate::common::{GlobalOrdinal, OlapError, Result};
use crate::config::EngineConfig;
use super::star::{Aggregator, ColumnExpr, ColumnKind, MeasureRef, Star};
use super::{RolapGalaxy, StarInfo};

/// 一个度量组：名称 + 所在的星
#[derive(Debug, Clone)]
pub struct MeasureGroup {
    pub name: String,
    pub star: Arc<Star>,
}

impl MeasureGroup {
    pub fn new(name: &str, star: Arc<Star>) -> Self {
        Self { name: name.into(), star }
    }
}

/// 全局序号的规范化键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GlobalKey {
    Column(ColumnExpr),
    Measure { fact: String, aggregator: Aggregator, expr: ColumnExpr },
}

#[derive(Default)]
pub struct GalaxyBuilder {
    groups: Vec<MeasureGroup>,
    config: EngineConfig,
}

impl GalaxyBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn measure_group(mut self, name: &str, star: Arc<Star>) -> Self {
        self.groups.push(MeasureGroup::new(name, star));
        self
    }

    pub fn build(self) -> Result<RolapGalaxy> {
        // ── 1. 按星归并 ───────────────────────────────────────────────────────
        let mut stars: Vec<Arc<Star>> = Vec::new();
        let mut group_star: HashMap<&str, Arc<Star>> = HashMap::new();
        for g in &self.groups {
            if !stars.iter().any(|s| s.alias() == g.star.alias()) {
                stars.push(g.star.clone());
            }
            group_star.insert(g.name.as_str(), g.star.clone());
        }

        // ── 2. 全局序号 ───────────────────────────────────────────────────────
        let mut canonical: HashMap<GlobalKey, GlobalOrdinal> = HashMap::new();
        let mut next: GlobalOrdinal = 0;
        let mut local_to_global: Vec<Vec<Option<GlobalOrdinal>>> = Vec::with_capacity(stars.len());

        for star in &stars {
            let mut mapping = vec![None; star.columns().len()];
            for col in star.columns() {
                let key = match &col.kind {
                    ColumnKind::Level => GlobalKey::Column(col.expr.clone()),
                    ColumnKind::Measure { .. } => {
                        resolve_measure(&group_star, star, col.bit_position, 0)?
                    }
                    ColumnKind::CopyLink { .. } => continue,
                };
                let ordinal = *canonical.entry(key).or_insert_with(|| {
                    next += 1;
                    next - 1
                });
                mapping[col.bit_position] = Some(ordinal);
            }
            local_to_global.push(mapping);
        }

        let mut passes = 0usize;
        loop {
            passes += 1;
            let mut added = 0usize;
            for (si, star) in stars.iter().enumerate() {
                for col in star.columns() {
                    let ColumnKind::CopyLink { source } = &col.kind else { continue };
                    if local_to_global[si][col.bit_position].is_some() {
                        continue;
                    }
                    if let Some(&g) = canonical.get(&GlobalKey::Column(source.clone())) {
                        local_to_global[si][col.bit_position] = Some(g);
                        // 后续从本列再拷贝的 CopyLink 也能解析
                        canonical.entry(GlobalKey::Column(col.expr.clone())).or_insert(g);
                        added += 1;
                    }
                }
            }
            trace!(pass = passes, added, "copy-link resolution pass");
            if added == 0 {
                break;
            }
        }

        let mut infos = Vec::with_capacity(stars.len());
        for (star, mapping) in stars.iter().zip(local_to_global) {
            let mut resolved = Vec::with_capacity(mapping.len());
            for (pos, g) in mapping.into_iter().enumerate() {
                let g = g.ok_or_else(|| OlapError::SchemaInconsistency(format!(
                    "column {} of star {} has no global ordinal after {passes} passes",
                    star.columns()[pos].expr, star.alias(),
                )))?;
                resolved.push(g);
            }
            infos.push((star.clone(), resolved));
        }

        // ── 3. BitKey 与 distinct 度量的安全上卷集合 ────────────────────────
        let total = next;
        let mut non_additive = BitKey::new(total);
        let mut safe_rollup: HashMap<GlobalOrdinal, BitKey> = HashMap::new();
        let mut covered = BitKey::new(total);
        let mut star_infos = Vec::with_capacity(infos.len());

        for (star, local_to_global) in infos {
            let mut measure_bit_key = BitKey::new(total);
            let mut level_bit_key   = BitKey::new(total);
            let mut global_to_local = HashMap::with_capacity(local_to_global.len());

            for col in star.columns() {
                let g = local_to_global[col.bit_position];
                global_to_local.entry(g).or_insert(col.bit_position);
                match &col.kind {
                    ColumnKind::Measure { aggregator, base, .. } => {
                        measure_bit_key.set(g);
                        let distinct = match base {
                            None    => aggregator.is_distinct(),
                            Some(r) => base_aggregator(&group_star, r)?.is_distinct(),
                        };
                        if distinct {
                            non_additive.set(g);
                            let safe = safe_rollup.entry(g).or_insert_with(|| BitKey::new(total));
                            if base.is_none() {
                                *safe = safe.or(&functional_dependents(&star, &col.expr, &local_to_global, total));
                            }
                        }
                    }
                    ColumnKind::Level | ColumnKind::CopyLink { .. } => level_bit_key.set(g),
                }
            }
            covered = covered.or(&measure_bit_key).or(&level_bit_key);
            star_infos.push(StarInfo {
                star, local_to_global, global_to_local, measure_bit_key, level_bit_key,
            });
        }

        if covered.cardinality() != total {
            return Err(OlapError::SchemaInconsistency(format!(
                "{} of {total} global ordinals are not covered by any star",
                total - covered.cardinality(),
            )));
        }

        // ── 4. 按代价排序 ─────────────────────────────────────────────────────
        star_infos.sort_by(|a, b| {
            a.star.cost().cmp(&b.star.cost()).then_with(|| a.star.alias().cmp(b.star.alias()))
        });
        let index = star_infos.iter()
            .enumerate()
            .map(|(i, s)| (s.star.alias().to_string(), i))
            .collect();

        debug!(
            stars = star_infos.len(), global_ordinals = total, passes,
            distinct_measures = non_additive.cardinality(),
            "galaxy built"
        );
        Ok(RolapGalaxy {
            stars: star_infos,
            index,
            non_additive,
            safe_rollup,
            config: self.config,
        })
    }
}

/// 解析度量的规范化身份；经 `base` 引用时取基础度量所在事实表、聚合器与表达式
fn resolve_measure(
    group_star: &HashMap<&str, Arc<Star>>,
    star:       &Star,
    pos:        usize,
    depth:      usize,
) -> Result<GlobalKey> {
    if depth > group_star.len() + 1 {
        return Err(OlapError::SchemaInconsistency(format!(
            "cyclic base-measure reference from star {}", star.alias(),
        )));
    }
    let col = &star.columns()[pos];
    match &col.kind {
        ColumnKind::Measure { aggregator, base: None, .. } => Ok(GlobalKey::Measure {
            fact:       star.alias().to_string(),
            aggregator: *aggregator,
            expr:       col.expr.clone(),
        }),
        ColumnKind::Measure { base: Some(r), .. } => {
            let (base_star, base_col) = lookup_measure(group_star, r)?;
            resolve_measure(group_star, base_star, base_col, depth + 1)
        }
        _ => Err(OlapError::SchemaInconsistency(format!(
            "column {} of star {} is not a measure", col.expr, star.alias(),
        ))),
    }
}

fn lookup_measure<'a>(
    group_star: &'a HashMap<&str, Arc<Star>>,
    r:          &MeasureRef,
) -> Result<(&'a Star, usize)> {
    let star = group_star.get(r.group.as_str()).ok_or_else(|| {
        OlapError::SchemaInconsistency(format!("unknown measure group {}", r.group))
    })?;
    let col = star.find_measure(&r.measure).ok_or_else(|| {
        OlapError::SchemaInconsistency(format!("unknown measure {}.{}", r.group, r.measure))
    })?;
    Ok((star.as_ref(), col.bit_position))
}

fn base_aggregator(group_star: &HashMap<&str, Arc<Star>>, r: &MeasureRef) -> Result<Aggregator> {
    let (star, pos) = lookup_measure(group_star, r)?;
    match &star.columns()[pos].kind {
        ColumnKind::Measure { base: Some(next), .. } => base_aggregator(group_star, next),
        ColumnKind::Measure { aggregator, .. }       => Ok(*aggregator),
        _ => unreachable!("lookup_measure only returns measure columns"),
    }
}

/// `arg` 之下 join 树中所有列（以及与 `arg` 同表达式的 level 列）的全局序号
fn functional_dependents(
    star:            &Star,
    arg:             &ColumnExpr,
    local_to_global: &[GlobalOrdinal],
    total:           usize,
) -> BitKey {
    let tables = star.tables_below(arg);
    let mut key = BitKey::new(total);
    for col in star.columns() {
        if col.is_measure() {
            continue;
        }
        if tables.contains(&col.table.as_str()) || &col.expr == arg {
            key.set(local_to_global[col.bit_position]);
        }
    }
    key
}
