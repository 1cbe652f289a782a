//! Galaxy：跨星列统一 + 聚合表选择
//!
//! 同一个 cube 的所有事实表 / 聚合表共享一个全局序号空间。
//! 构建见 [`GalaxyBuilder`]，构建完成后只读，查询无需加锁。

mod builder;
pub mod star;

pub use builder::{GalaxyBuilder, MeasureGroup};
pub use star::{Aggregator, ColumnExpr, ColumnKind, MeasureRef, Star, StarColumn, StarTable};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::bitkey::BitKey;
use crate::common::{GlobalOrdinal, LocalOrdinal, OlapError, Result, StarId};
use crate::config::EngineConfig;

// ── StarInfo ──────────────────────────────────────────────────────────────────

/// 单个星在全局序号空间中的视图
#[derive(Debug)]
pub struct StarInfo {
    star:            Arc<Star>,
    local_to_global: Vec<GlobalOrdinal>,
    global_to_local: HashMap<GlobalOrdinal, LocalOrdinal>,
    /// 全局宽度；标记本星拥有的度量
    measure_bit_key: BitKey,
    /// 全局宽度；标记本星拥有的 level / 维度列
    level_bit_key:   BitKey,
}

impl StarInfo {
    pub fn star(&self) -> &Arc<Star> { &self.star }

    pub fn measure_bit_key(&self) -> &BitKey { &self.measure_bit_key }

    pub fn level_bit_key(&self) -> &BitKey { &self.level_bit_key }

    pub fn global_ordinal(&self, local: LocalOrdinal) -> Option<GlobalOrdinal> {
        self.local_to_global.get(local).copied()
    }

    pub fn local_ordinal(&self, global: GlobalOrdinal) -> Option<LocalOrdinal> {
        self.global_to_local.get(&global).copied()
    }

    /// 局部 BitKey -> 全局 BitKey
    fn to_global(&self, local: &BitKey, width: usize) -> Result<BitKey> {
        let mut global = BitKey::new(width);
        for pos in local.iter() {
            let g = self.global_ordinal(pos).ok_or_else(|| OlapError::ContractViolation(format!(
                "bit {pos} is not a column of star {}", self.star.alias(),
            )))?;
            global.set(g);
        }
        Ok(global)
    }
}

/// findAgg 的结果
#[derive(Debug, Clone)]
pub struct AggMatch {
    pub star:   Arc<Star>,
    /// 需要在该表上再聚合，而不是逐行直取
    pub rollup: bool,
}

// ── RolapGalaxy ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RolapGalaxy {
    /// 按 (cost, alias) 升序
    stars:        Vec<StarInfo>,
    index:        HashMap<StarId, usize>,
    non_additive: BitKey,
    safe_rollup:  HashMap<GlobalOrdinal, BitKey>,
    config:       EngineConfig,
}

impl RolapGalaxy {
    pub fn builder() -> GalaxyBuilder { GalaxyBuilder::new() }

    pub fn star_count(&self) -> usize { self.stars.len() }

    pub fn global_column_count(&self) -> usize { self.non_additive.size() }

    /// 按代价升序的星
    pub fn stars(&self) -> impl Iterator<Item = &StarInfo> { self.stars.iter() }

    pub fn star_info(&self, alias: &str) -> Option<&StarInfo> {
        self.index.get(alias).map(|&i| &self.stars[i])
    }

    pub fn global_ordinal(&self, alias: &str, local: LocalOrdinal) -> Option<GlobalOrdinal> {
        self.star_info(alias)?.global_ordinal(local)
    }

    pub fn is_non_additive(&self, global: GlobalOrdinal) -> bool {
        global < self.non_additive.size() && self.non_additive.get(global)
    }

    /// distinct 类度量可以安全上卷掉的全局列
    pub fn safe_rollup_columns(&self, global: GlobalOrdinal) -> Option<&BitKey> {
        self.safe_rollup.get(&global)
    }

    /// 本地列在另一个星中的对应列
    pub fn get_equivalent_column(
        &self,
        column: LocalOrdinal,
        from:   &str,
        to:     &str,
    ) -> Option<&StarColumn> {
        let global = self.star_info(from)?.global_ordinal(column)?;
        let target = self.star_info(to)?;
        target.star.column(target.local_ordinal(global)?)
    }

    /// 找到能满足请求的最便宜的表
    ///
    /// `level_bit_key` / `measure_bit_key` 以 `star` 的局部 bit 位置表示。
    /// 返回 `None` 表示没有比原表更便宜的可用表，调用方应继续使用原表。
    pub fn find_agg(
        &self,
        star:            &str,
        level_bit_key:   &BitKey,
        measure_bit_key: &BitKey,
    ) -> Result<Option<AggMatch>> {
        if !self.config.use_aggregates {
            return Ok(None);
        }
        let origin = self.star_info(star).ok_or_else(|| OlapError::StarNotFound(star.into()))?;
        let width = self.global_column_count();
        let levels   = origin.to_global(level_bit_key, width)?;
        let measures = origin.to_global(measure_bit_key, width)?;

        for cand in &self.stars {
            if cand.star.alias() == star {
                trace!(star, "no aggregate cheaper than the requested star");
                return Ok(None);
            }
            if !cand.measure_bit_key.is_superset_of(&measures)
                || !cand.level_bit_key.is_superset_of(&levels)
            {
                continue;
            }

            let rollup = !cand.star.grain_unique() || !cand.level_bit_key.same_bits(&levels);
            let distinct = measures.and(&self.non_additive);
            if rollup && !distinct.is_empty() {
                let aggregated_away = cand.level_bit_key.and_not(&levels);
                for m in distinct.iter() {
                    let safe = self.safe_rollup.get(&m);
                    if !safe.is_some_and(|s| s.is_superset_of(&aggregated_away)) {
                        warn!(
                            star, candidate = cand.star.alias(), measure = m,
                            aggregated_away = %aggregated_away,
                            "aggregate rejected: distinct measure cannot roll up"
                        );
                        return Ok(None);
                    }
                }
            }
            trace!(star, candidate = cand.star.alias(), rollup, "aggregate chosen");
            return Ok(Some(AggMatch { star: cand.star.clone(), rollup }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(t: &str, c: &str) -> ColumnExpr { ColumnExpr::column(t, c) }

    fn local_key(star: &Star, cols: &[(&str, &str)], measures: &[&str]) -> (BitKey, BitKey) {
        let width = star.columns().len();
        let levels = BitKey::from_positions(
            width,
            cols.iter().map(|(t, c)| star.find_level(t, c).unwrap().bit_position),
        );
        let ms = BitKey::from_positions(
            width,
            measures.iter().map(|m| star.find_measure(m).unwrap().bit_position),
        );
        (levels, ms)
    }

    /// sales(1000) 带 L1/L2 + M；agg_big(100) 带 L1/L2；agg_small(10) 只有 L1
    fn three_stars() -> (Arc<Star>, RolapGalaxy) {
        let sales = Arc::new(
            Star::fact("sales", 1000)
                .level("time", "year")
                .level("store", "state")
                .measure("sales", "M", Aggregator::Sum, "unit_sales"),
        );
        let big = Arc::new(
            Star::aggregate("agg_big", 100)
                .copy_link("agg_big", "year", col("time", "year"))
                .copy_link("agg_big", "state", col("store", "state"))
                .measure_ref("agg_big", "M", Aggregator::Sum, "unit_sales", MeasureRef::new("Sales", "M")),
        );
        let small = Arc::new(
            Star::aggregate("agg_small", 10)
                .copy_link("agg_small", "year", col("time", "year"))
                .measure_ref("agg_small", "M", Aggregator::Sum, "unit_sales", MeasureRef::new("Sales", "M")),
        );
        let galaxy = RolapGalaxy::builder()
            .measure_group("Sales", sales.clone())
            .measure_group("AggBig", big)
            .measure_group("AggSmall", small)
            .build()
            .unwrap();
        (sales, galaxy)
    }

    #[test]
    fn stars_sorted_by_cost() {
        let (_, g) = three_stars();
        let order: Vec<_> = g.stars().map(|s| s.star().alias().to_string()).collect();
        assert_eq!(order, vec!["agg_small", "agg_big", "sales"]);
        assert_eq!(g.global_column_count(), 3);
        for s in g.stars() {
            assert_eq!(s.level_bit_key().size(), 3);
            assert_eq!(s.measure_bit_key().size(), 3);
        }
    }

    #[test]
    fn equivalent_columns_map_both_ways() {
        let (_, g) = three_stars();
        let x = g.get_equivalent_column(1, "sales", "agg_big").unwrap();
        assert_eq!(x.expr, col("agg_big", "state"));
        let back = g.get_equivalent_column(x.bit_position, "agg_big", "sales").unwrap();
        assert_eq!(back.bit_position, 1);
        assert!(g.get_equivalent_column(1, "sales", "agg_small").is_none());
        assert!(g.get_equivalent_column(1, "sales", "nope").is_none());
        assert!(g.get_equivalent_column(9, "sales", "agg_big").is_none());
    }

    #[test]
    fn cheapest_adequate_star_wins() {
        let (sales, g) = three_stars();
        let (levels, measures) = local_key(&sales, &[("time", "year"), ("store", "state")], &["M"]);
        let m = g.find_agg("sales", &levels, &measures).unwrap().unwrap();
        assert_eq!(m.star.alias(), "agg_big");
        assert!(!m.rollup);

        let (levels, measures) = local_key(&sales, &[("time", "year")], &["M"]);
        let m = g.find_agg("sales", &levels, &measures).unwrap().unwrap();
        assert_eq!(m.star.alias(), "agg_small");
        assert!(!m.rollup);
    }

    #[test]
    fn requested_star_already_cheapest() {
        let (_, g) = three_stars();
        let small = g.star_info("agg_small").unwrap().star().clone();
        let (levels, measures) = local_key(&small, &[], &["M"]);
        assert!(g.find_agg("agg_small", &levels, &measures).unwrap().is_none());
    }

    #[test]
    fn aggregates_can_be_disabled() {
        let (sales, _) = three_stars();
        let g = RolapGalaxy::builder()
            .measure_group("Sales", sales.clone())
            .config(EngineConfig { use_aggregates: false, ..EngineConfig::default() })
            .build()
            .unwrap();
        let (levels, measures) = local_key(&sales, &[("time", "year")], &["M"]);
        assert!(g.find_agg("sales", &levels, &measures).unwrap().is_none());
    }

    #[test]
    fn unknown_star_is_error() {
        let (sales, g) = three_stars();
        let (levels, measures) = local_key(&sales, &[], &["M"]);
        assert!(matches!(
            g.find_agg("nope", &levels, &measures),
            Err(OlapError::StarNotFound(_)),
        ));
    }

    // ── distinct-count ───────────────────────────────────────────────────────

    /// 事实表：customer_count = distinct(sales.customer_id)，customer 维表挂在 customer_id 下
    fn distinct_galaxy() -> (Arc<Star>, RolapGalaxy) {
        let sales = Arc::new(
            Star::fact("sales", 1000)
                .join("customer", "sales", col("sales", "customer_id"), col("customer", "customer_id"))
                .level("time", "year")
                .level("store", "state")
                .level("customer", "gender")
                .measure("sales", "Customer Count", Aggregator::DistinctCount, "customer_id"),
        );
        // 按 year/state/gender 预聚合，上卷掉 state 不安全，上卷掉 gender 安全
        let agg = Arc::new(
            Star::aggregate("agg_ysg", 50)
                .copy_link("agg_ysg", "year", col("time", "year"))
                .copy_link("agg_ysg", "state", col("store", "state"))
                .copy_link("agg_ysg", "gender", col("customer", "gender"))
                .measure_ref(
                    "agg_ysg", "Customer Count", Aggregator::Sum, "customer_count",
                    MeasureRef::new("Sales", "Customer Count"),
                ),
        );
        let galaxy = RolapGalaxy::builder()
            .measure_group("Sales", sales.clone())
            .measure_group("Agg", agg)
            .build()
            .unwrap();
        (sales, galaxy)
    }

    #[test]
    fn distinct_rollup_over_unsafe_column_rejected() {
        let (sales, g) = distinct_galaxy();
        let (levels, measures) =
            local_key(&sales, &[("time", "year"), ("customer", "gender")], &["Customer Count"]);
        assert!(g.find_agg("sales", &levels, &measures).unwrap().is_none());
    }

    #[test]
    fn distinct_rollup_over_dependent_column_allowed() {
        let (sales, g) = distinct_galaxy();
        let (levels, measures) =
            local_key(&sales, &[("time", "year"), ("store", "state")], &["Customer Count"]);
        let m = g.find_agg("sales", &levels, &measures).unwrap().unwrap();
        assert_eq!(m.star.alias(), "agg_ysg");
        assert!(m.rollup);
    }

    #[test]
    fn distinct_exact_grain_needs_no_check() {
        let (sales, g) = distinct_galaxy();
        let (levels, measures) = local_key(
            &sales,
            &[("time", "year"), ("store", "state"), ("customer", "gender")],
            &["Customer Count"],
        );
        let m = g.find_agg("sales", &levels, &measures).unwrap().unwrap();
        assert!(!m.rollup);
    }

    #[test]
    fn distinct_measure_marked_non_additive() {
        let (_, g) = distinct_galaxy();
        let gm = g.global_ordinal("sales", 3).unwrap();
        assert!(g.is_non_additive(gm));
        assert_eq!(g.global_ordinal("agg_ysg", 3), Some(gm));
        let gender = g.global_ordinal("sales", 2).unwrap();
        assert!(g.safe_rollup_columns(gm).unwrap().get(gender));
        assert!(!g.is_non_additive(gender));
    }

    // ── CopyLink ─────────────────────────────────────────────────────────────

    #[test]
    fn chained_copy_links_resolve() {
        let fact = Arc::new(
            Star::fact("f", 100)
                .level("d", "k")
                .measure("f", "M", Aggregator::Sum, "m"),
        );
        // a2 拷贝自 a1 的列，a1 的列拷贝自事实表维度
        let a2 = Arc::new(
            Star::aggregate("a2", 5)
                .copy_link("a2", "k", col("a1", "k"))
                .measure_ref("a2", "M", Aggregator::Sum, "m", MeasureRef::new("F", "M")),
        );
        let a1 = Arc::new(
            Star::aggregate("a1", 10)
                .copy_link("a1", "k", col("d", "k"))
                .measure_ref("a1", "M", Aggregator::Sum, "m", MeasureRef::new("F", "M")),
        );
        let g = RolapGalaxy::builder()
            .measure_group("A2", a2)
            .measure_group("A1", a1)
            .measure_group("F", fact)
            .build()
            .unwrap();
        assert_eq!(g.global_column_count(), 2);
        assert_eq!(g.global_ordinal("a2", 0), g.global_ordinal("f", 0));
        assert_eq!(g.get_equivalent_column(0, "a2", "f").unwrap().expr, col("d", "k"));
    }

    #[test]
    fn unresolved_copy_link_fails_build() {
        let fact = Arc::new(Star::fact("f", 100).level("d", "k"));
        let agg = Arc::new(Star::aggregate("a", 1).copy_link("a", "k", col("missing", "k")));
        let err = RolapGalaxy::builder()
            .measure_group("F", fact)
            .measure_group("A", agg)
            .build()
            .unwrap_err();
        assert!(matches!(err, OlapError::SchemaInconsistency(_)));
    }

    #[test]
    fn unknown_base_measure_fails_build() {
        let agg = Arc::new(
            Star::aggregate("a", 1)
                .measure_ref("a", "M", Aggregator::Sum, "m", MeasureRef::new("Nope", "M")),
        );
        let err = RolapGalaxy::builder().measure_group("A", agg).build().unwrap_err();
        assert!(matches!(err, OlapError::SchemaInconsistency(_)));
    }
}
