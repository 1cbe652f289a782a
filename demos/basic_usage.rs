//! # rolap-cache-engine 使用案例
//!
//! 1. CellKey / Modulos 坐标编解码
//! 2. 只读成员缓存（CacheMemberReader）：compare / range / lead
//! 3. 可变成员缓存（MemberCacheHelper）：put / remove / flush
//! 4. Galaxy：全局列统一 + 聚合表选择（含 distinct-count 上卷保护）
//! 5. Segment 数据集与序列化

use std::sync::Arc;

use rolap_cache_engine::{
    bitkey::BitKey,
    cell_key::CellKey,
    common::Result,
    config::{CompressionType, EngineConfig},
    galaxy::{Aggregator, ColumnExpr, MeasureRef, RolapGalaxy, Star},
    member::{Hierarchy, KeyValue, Member},
    member_cache::{MemberCache, MemberCacheHelper},
    member_reader::{CacheMemberReader, MemberReader, MemberSource},
    modulos::Modulos,
    segment::{SegmentBody, SegmentDataset},
};

/// 内存中的成员源，代替 SQL 加载器
struct StaticSource {
    hierarchy: Hierarchy,
    members:   Vec<Member>,
}

impl MemberSource for StaticSource {
    fn hierarchy(&self) -> &Hierarchy { &self.hierarchy }
    fn set_cache(&self, _cache: Arc<dyn MemberCache>) -> bool { false }
    fn members(&self) -> Result<Vec<Member>> { Ok(self.members.clone()) }
    fn root_members(&self) -> Result<Vec<Member>> {
        Ok(self.members.iter().filter(|m| m.parent().is_none()).cloned().collect())
    }
    fn member_children(&self, parent: &Member) -> Result<Vec<Member>> {
        Ok(self.members.iter().filter(|m| m.parent() == Some(parent)).cloned().collect())
    }
    fn member_count(&self) -> Result<usize> { Ok(self.members.len()) }
    fn lookup_member(&self, unique_name: &str) -> Result<Option<Member>> {
        Ok(self.members.iter().find(|m| m.unique_name() == unique_name).cloned())
    }
}

fn main() -> Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("   rolap-cache-engine 演示                                  ");
    println!("═══════════════════════════════════════════════════════════\n");

    // =========================================================================
    // 1. 坐标编解码
    // =========================================================================
    println!("【1】CellKey / Modulos ...");
    let key = CellKey::from_ordinals(&[2, 3, 4]);
    println!("    key {key} · [50, 10, 1] = {}", key.offset(&[50, 10, 1]));
    let modulos = Modulos::create(&[2, 5, 10]);
    let pos = modulos.cell_pos(37);
    println!("    ordinal 37 → {pos:?} → {}\n", modulos.cell_ordinal(&pos));

    // =========================================================================
    // 2. 只读成员缓存
    // =========================================================================
    println!("【2】CacheMemberReader ...");
    let hierarchy = Hierarchy::new("Store", &["Country", "State"]);
    let (country, state) = (hierarchy.levels()[0].clone(), hierarchy.levels()[1].clone());
    let usa = Member::new(&country, None, "USA", "USA".into());
    let ca  = Member::new(&state, Some(&usa), "CA", "CA".into());
    let or  = Member::new(&state, Some(&usa), "OR", "OR".into());
    let wa  = Member::new(&state, Some(&usa), "WA", "WA".into());
    let source = StaticSource {
        hierarchy: hierarchy.clone(),
        members:   vec![usa.clone(), ca.clone(), or.clone(), wa.clone()],
    };
    let reader = CacheMemberReader::new(&source)?;
    println!("    members       = {}", reader.member_count()?);
    println!("    compare(CA,WA) = {:?}", reader.compare(&ca, &wa, false)?);
    println!("    siblings eq    = {:?}", reader.compare(&ca, &wa, true)?);
    let range: Vec<_> = reader.member_range(&state, &ca, &or)?
        .iter().map(|m| m.name().to_string()).collect();
    println!("    range CA..OR  = {range:?}");
    println!("    lead(CA, 2)   = {:?}\n", reader.lead_member(&ca, 2)?.map(|m| m.name().to_string()));

    // =========================================================================
    // 3. 可变成员缓存
    // =========================================================================
    println!("【3】MemberCacheHelper ...");
    let cache = MemberCacheHelper::new(hierarchy.clone());
    for m in [&usa, &ca, &or, &wa] {
        cache.put_member(m.level(), m.key().clone(), m.clone())?;
    }
    cache.put_children(&usa, None, vec![ca.clone(), or.clone(), wa.clone()])?;
    cache.remove_member(&state, &KeyValue::from("OR"))?;
    let kids: Vec<_> = cache.get_children_from_cache(&usa, None).unwrap_or_default()
        .iter().map(|m| m.name().to_string()).collect();
    println!("    after remove OR: children = {kids:?}, cached = {}", cache.member_count());
    cache.flush_cache()?;
    println!("    after flush: cached = {}\n", cache.member_count());

    // =========================================================================
    // 4. Galaxy
    // =========================================================================
    println!("【4】RolapGalaxy ...");
    let sales = Arc::new(
        Star::fact("sales_fact", 1_000_000)
            .join("customer", "sales_fact",
                  ColumnExpr::column("sales_fact", "customer_id"),
                  ColumnExpr::column("customer", "customer_id"))
            .level("time", "year")
            .level("store", "state")
            .level("customer", "gender")
            .measure("sales_fact", "Unit Sales", Aggregator::Sum, "unit_sales")
            .measure("sales_fact", "Customer Count", Aggregator::DistinctCount, "customer_id"),
    );
    let agg = Arc::new(
        Star::aggregate("agg_year_state_gender", 5_000)
            .copy_link("agg_year_state_gender", "year", ColumnExpr::column("time", "year"))
            .copy_link("agg_year_state_gender", "state", ColumnExpr::column("store", "state"))
            .copy_link("agg_year_state_gender", "gender", ColumnExpr::column("customer", "gender"))
            .measure_ref("agg_year_state_gender", "Unit Sales", Aggregator::Sum, "unit_sales",
                         MeasureRef::new("Sales", "Unit Sales"))
            .measure_ref("agg_year_state_gender", "Customer Count", Aggregator::Sum, "customer_count",
                         MeasureRef::new("Sales", "Customer Count")),
    );
    let galaxy = RolapGalaxy::builder()
        .measure_group("Sales", sales.clone())
        .measure_group("Agg", agg)
        .config(EngineConfig::default())
        .build()?;
    println!("    stars = {}, global columns = {}", galaxy.star_count(), galaxy.global_column_count());

    let width = sales.columns().len();
    let year_only = BitKey::from_positions(width, [0]);
    let unit_sales = BitKey::from_positions(width, [3]);
    let customer_count = BitKey::from_positions(width, [4]);
    let found = galaxy.find_agg("sales_fact", &year_only, &unit_sales)?;
    println!("    {{year}} × Unit Sales     → {:?}",
             found.map(|m| (m.star.alias().to_string(), m.rollup)));
    let found = galaxy.find_agg("sales_fact", &year_only, &customer_count)?;
    println!("    {{year}} × Customer Count → {:?}（state 不能安全上卷）\n",
             found.map(|m| m.star.alias().to_string()));

    // =========================================================================
    // 5. Segment
    // =========================================================================
    println!("【5】SegmentDataset + SegmentBody ...");
    let cfg = EngineConfig::default();
    let mut ds = SegmentDataset::choose(&[2, 50], 3, &cfg);
    ds.put(&CellKey::from_ordinals(&[0, 7]), 12.5);
    ds.put(&CellKey::from_ordinals(&[1, 49]), 3.0);
    let bytes = SegmentBody::encode(&ds, CompressionType::Lz4)?;
    let back = SegmentBody::decode(&bytes)?;
    println!("    sparse = {}, cells = {}, encoded = {} bytes", back.is_sparse(), back.cell_count(), bytes.len());

    println!("\n✓ 演示完成");
    Ok(())
}
