//! 回源式成员读取器
//!
//! 先查 [`MemberCacheHelper`]，未命中时调用外部成员源（通常是 SQL 加载器），
//! 再把结果写回缓存。外部错误原样上抛，不重试。

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::common::{OlapError, Result};
use crate::member::{
    Hierarchy, KeyValue, Level, Member, MemberConstraint, UNKNOWN_ROW_COUNT,
};
use crate::member_cache::{MemberCache, MemberCacheHelper};
use super::{MemberReader, MemberSource};

pub struct SmartMemberReader {
    source: Arc<dyn MemberReader>,
    cache:  Arc<MemberCacheHelper>,
}

impl SmartMemberReader {
    pub fn new(source: Arc<dyn MemberReader>) -> Self {
        let cache = Arc::new(MemberCacheHelper::new(source.hierarchy().clone()));
        if !source.set_cache(cache.clone()) {
            trace!(hierarchy = source.hierarchy().name(), "source declined cache write-back");
        }
        Self { source, cache }
    }

    pub fn member_cache(&self) -> &Arc<MemberCacheHelper> { &self.cache }

    fn register(&self, members: &[Member]) -> Result<()> {
        for m in members {
            self.cache.put_member(m.level(), m.key().clone(), m.clone())?;
        }
        Ok(())
    }

    fn position_in(list: &[Member], member: &Member) -> Result<usize> {
        list.iter()
            .position(|m| m == member)
            .ok_or_else(|| OlapError::MemberNotFound(member.unique_name().to_string()))
    }

    /// 同父成员在父成员子列表（或根成员列表）中的先后
    fn compare_siblings(&self, m1: &Member, m2: &Member) -> Result<Ordering> {
        let siblings = match m1.parent() {
            Some(parent) => self.member_children_constrained(parent, None)?,
            None         => self.root_members()?,
        };
        let p1 = Self::position_in(&siblings, m1)?;
        let p2 = Self::position_in(&siblings, m2)?;
        Ok(p1.cmp(&p2))
    }

    fn compare_optional(&self, m1: Option<&Member>, m2: Option<&Member>) -> Result<Ordering> {
        match (m1, m2) {
            (Some(a), Some(b)) => self.compare(a, b, false),
            (None, None)       => Ok(Ordering::Equal),
            (None, Some(_))    => Ok(Ordering::Less),
            (Some(_), None)    => Ok(Ordering::Greater),
        }
    }
}

impl MemberSource for SmartMemberReader {
    fn hierarchy(&self) -> &Hierarchy { self.source.hierarchy() }

    /// 只使用自己的缓存
    fn set_cache(&self, _cache: Arc<dyn MemberCache>) -> bool { false }

    fn members(&self) -> Result<Vec<Member>> { self.source.members() }

    fn root_members(&self) -> Result<Vec<Member>> {
        match self.hierarchy().level(0) {
            Some(top) => self.members_in_level(&top.clone(), None),
            None      => Ok(Vec::new()),
        }
    }

    fn member_children(&self, parent: &Member) -> Result<Vec<Member>> {
        self.member_children_constrained(parent, None)
    }

    fn member_count(&self) -> Result<usize> { self.source.member_count() }

    fn lookup_member(&self, unique_name: &str) -> Result<Option<Member>> {
        self.source.lookup_member(unique_name)
    }
}

impl MemberReader for SmartMemberReader {
    fn lead_member(&self, member: &Member, n: isize) -> Result<Option<Member>> {
        if n == 0 {
            return Ok(Some(member.clone()));
        }
        let level_members = self.members_in_level(member.level(), None)?;
        let pos = Self::position_in(&level_members, member)?;
        match (pos as isize).checked_add(n) {
            Some(target) if target >= 0 => Ok(level_members.get(target as usize).cloned()),
            _ => Ok(None),
        }
    }

    fn member_range(&self, level: &Level, start: &Member, end: &Member) -> Result<Vec<Member>> {
        assert_eq!(
            start.level(), end.level(),
            "member range endpoints must share a level",
        );
        if self.compare(start, end, false)? == Ordering::Greater {
            return Ok(Vec::new());
        }
        let level_members = self.members_in_level(level, None)?;
        let lo = Self::position_in(&level_members, start)?;
        let hi = Self::position_in(&level_members, end)?;
        Ok(level_members[lo..=hi].to_vec())
    }

    fn members_in_level(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>> {
        if let Some(hit) = self.cache.get_level_members_from_cache(level, constraint) {
            return Ok(hit);
        }
        let loaded = self.source.members_in_level(level, constraint)?;
        trace!(level = level.unique_name(), count = loaded.len(), "level members loaded");
        self.register(&loaded)?;
        self.cache.put_level_members(level, constraint, loaded.clone())?;
        Ok(loaded)
    }

    /// 近似行数缓存在 Level 上，flush 后重新向成员源询问
    fn level_member_count(&self, level: &Level) -> Result<usize> {
        let cached = level.approx_row_count();
        if cached != UNKNOWN_ROW_COUNT {
            return Ok(cached as usize);
        }
        let count = self.source.level_member_count(level)?;
        level.set_approx_row_count(count as i64);
        Ok(count)
    }

    fn member_children_constrained(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>> {
        if let Some(hit) = self.cache.get_children_from_cache(parent, constraint) {
            return Ok(hit);
        }
        let loaded = self.source.member_children_constrained(parent, constraint)?;
        self.register(&loaded)?;
        self.cache.put_children(parent, constraint, loaded.clone())?;
        Ok(loaded)
    }

    fn member_by_key(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>> {
        if let Some(hit) = self.cache.get_member(level, key) {
            return Ok(Some(hit));
        }
        let loaded = self.source.member_by_key(level, key)?;
        if let Some(m) = &loaded {
            self.cache.put_member(level, key.clone(), m.clone())?;
        }
        Ok(loaded)
    }

    /// 沿父链比较先序位置：较深的一方先上溯到同深度，
    /// 祖先与后代比较时祖先在前
    fn compare(&self, m1: &Member, m2: &Member, siblings_are_equal: bool) -> Result<Ordering> {
        if m1 == m2 {
            return Ok(Ordering::Equal);
        }
        if m1.same_parent(m2) {
            if siblings_are_equal {
                return Ok(Ordering::Equal);
            }
            return self.compare_siblings(m1, m2);
        }
        let (d1, d2) = (m1.depth(), m2.depth());
        match d1.cmp(&d2) {
            Ordering::Less => {
                let c = self.compare_optional(Some(m1), m2.parent())?;
                Ok(if c == Ordering::Equal { Ordering::Less } else { c })
            }
            Ordering::Greater => {
                let c = self.compare_optional(m1.parent(), Some(m2))?;
                Ok(if c == Ordering::Equal { Ordering::Greater } else { c })
            }
            Ordering::Equal => self.compare_optional(m1.parent(), m2.parent()),
        }
    }

    fn default_member(&self) -> Result<Option<Member>> {
        let root = self.root_members()?.into_iter().next();
        debug!(hierarchy = self.hierarchy().name(), found = root.is_some(), "default member resolved");
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use crate::member::ChildByNameConstraint;

    /// 模拟 SQL 成员源：统计回源次数；不需要的方法返回 Unsupported
    struct SqlLikeSource {
        hierarchy: Hierarchy,
        members:   Vec<Member>,
        loads:     AtomicUsize,
        fail:      bool,
    }

    impl SqlLikeSource {
        fn hit(&self) -> Result<()> {
            self.loads.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail {
                return Err(OlapError::Source("connection reset".into()));
            }
            Ok(())
        }
    }

    impl MemberSource for SqlLikeSource {
        fn hierarchy(&self) -> &Hierarchy { &self.hierarchy }
        fn set_cache(&self, _cache: Arc<dyn MemberCache>) -> bool { false }
        fn members(&self) -> Result<Vec<Member>> { self.hit()?; Ok(self.members.clone()) }
        fn root_members(&self) -> Result<Vec<Member>> {
            self.hit()?;
            Ok(self.members.iter().filter(|m| m.parent().is_none()).cloned().collect())
        }
        fn member_children(&self, parent: &Member) -> Result<Vec<Member>> {
            self.member_children_constrained(parent, None)
        }
        fn member_count(&self) -> Result<usize> { Ok(self.members.len()) }
        fn lookup_member(&self, name: &str) -> Result<Option<Member>> {
            Ok(self.members.iter().find(|m| m.unique_name() == name).cloned())
        }
    }

    impl MemberReader for SqlLikeSource {
        fn lead_member(&self, _m: &Member, _n: isize) -> Result<Option<Member>> {
            Err(OlapError::unsupported("lead_member"))
        }
        fn member_range(&self, _l: &Level, _s: &Member, _e: &Member) -> Result<Vec<Member>> {
            Err(OlapError::unsupported("member_range"))
        }
        fn members_in_level(
            &self, level: &Level, constraint: Option<&dyn MemberConstraint>,
        ) -> Result<Vec<Member>> {
            self.hit()?;
            Ok(self.members.iter()
                .filter(|m| m.level() == level && constraint.map_or(true, |c| c.accepts(m)))
                .cloned()
                .collect())
        }
        fn level_member_count(&self, level: &Level) -> Result<usize> {
            self.hit()?;
            Ok(self.members.iter().filter(|m| m.level() == level).count())
        }
        fn member_children_constrained(
            &self, parent: &Member, constraint: Option<&dyn MemberConstraint>,
        ) -> Result<Vec<Member>> {
            self.hit()?;
            Ok(self.members.iter()
                .filter(|m| m.parent() == Some(parent) && constraint.map_or(true, |c| c.accepts(m)))
                .cloned()
                .collect())
        }
        fn member_by_key(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>> {
            self.hit()?;
            Ok(self.members.iter().find(|m| m.level() == level && m.key() == key).cloned())
        }
        fn compare(&self, _a: &Member, _b: &Member, _s: bool) -> Result<Ordering> {
            Err(OlapError::unsupported("compare"))
        }
    }

    /// Time: 1997 {Q1 {Jan, Feb}, Q2 {Apr}}, 1998 {Q1 {Jan}}
    fn time_source(fail: bool) -> Arc<SqlLikeSource> {
        let h = Hierarchy::new("Time", &["Year", "Quarter", "Month"]);
        let (y, q, mo) = (&h.levels()[0], &h.levels()[1], &h.levels()[2]);
        let y97    = Member::new(y, None, "1997", KeyValue::Int(1997));
        let q1     = Member::new(q, Some(&y97), "Q1", KeyValue::Composite(vec![1997.into(), "Q1".into()]));
        let jan    = Member::new(mo, Some(&q1), "Jan", KeyValue::Int(199701));
        let feb    = Member::new(mo, Some(&q1), "Feb", KeyValue::Int(199702));
        let q2     = Member::new(q, Some(&y97), "Q2", KeyValue::Composite(vec![1997.into(), "Q2".into()]));
        let apr    = Member::new(mo, Some(&q2), "Apr", KeyValue::Int(199704));
        let y98    = Member::new(y, None, "1998", KeyValue::Int(1998));
        let q1_98  = Member::new(q, Some(&y98), "Q1", KeyValue::Composite(vec![1998.into(), "Q1".into()]));
        let jan_98 = Member::new(mo, Some(&q1_98), "Jan", KeyValue::Int(199801));
        Arc::new(SqlLikeSource {
            hierarchy: h,
            members: vec![y97, q1, jan, feb, q2, apr, y98, q1_98, jan_98],
            loads: AtomicUsize::new(0),
            fail,
        })
    }

    fn member(src: &SqlLikeSource, name: &str) -> Member {
        src.members.iter().find(|m| m.unique_name() == name).cloned().unwrap()
    }

    #[test]
    fn children_are_loaded_once() {
        let src = time_source(false);
        let reader = SmartMemberReader::new(src.clone());
        let y97 = member(&src, "[Time].[1997]");
        let first = reader.member_children(&y97).unwrap();
        let second = reader.member_children(&y97).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(src.loads.load(AtomicOrdering::SeqCst), 1);
        // 子成员同时登记进 key → member 映射
        let q1 = &first[0];
        assert_eq!(reader.member_cache().get_member(q1.level(), q1.key()).as_ref(), Some(q1));
    }

    #[test]
    fn constrained_children_use_separate_slot() {
        let src = time_source(false);
        let reader = SmartMemberReader::new(src.clone());
        let y97 = member(&src, "[Time].[1997]");
        reader.member_children(&y97).unwrap();
        let only_q2 = ChildByNameConstraint::new(["Q2"]);
        let kids = reader.member_children_constrained(&y97, Some(&only_q2)).unwrap();
        assert_eq!(kids, vec![member(&src, "[Time].[1997].[Q2]")]);
        assert_eq!(src.loads.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn source_errors_propagate() {
        let src = time_source(true);
        let reader = SmartMemberReader::new(src.clone());
        let y97 = member(&src, "[Time].[1997]");
        assert!(matches!(reader.member_children(&y97), Err(OlapError::Source(_))));
        assert!(reader.member_cache().get_children_from_cache(&y97, None).is_none());
    }

    #[test]
    fn preorder_compare_across_parents() {
        let src = time_source(false);
        let reader = SmartMemberReader::new(src.clone());
        let y97 = member(&src, "[Time].[1997]");
        let feb = member(&src, "[Time].[1997].[Q1].[Feb]");
        let apr = member(&src, "[Time].[1997].[Q2].[Apr]");
        let q1  = member(&src, "[Time].[1997].[Q1]");
        let y98 = member(&src, "[Time].[1998]");
        let jan98 = member(&src, "[Time].[1998].[Q1].[Jan]");
        assert_eq!(reader.compare(&feb, &apr, false).unwrap(), Ordering::Less);
        assert_eq!(reader.compare(&y97, &feb, false).unwrap(), Ordering::Less);
        assert_eq!(reader.compare(&feb, &q1, false).unwrap(), Ordering::Greater);
        assert_eq!(reader.compare(&jan98, &apr, false).unwrap(), Ordering::Greater);
        assert_eq!(reader.compare(&y97, &y98, true).unwrap(), Ordering::Equal);
        assert_eq!(reader.compare(&y97, &y98, false).unwrap(), Ordering::Less);
    }

    #[test]
    fn lead_and_range_cross_parents() {
        let src = time_source(false);
        let reader = SmartMemberReader::new(src.clone());
        let feb = member(&src, "[Time].[1997].[Q1].[Feb]");
        let jan98 = member(&src, "[Time].[1998].[Q1].[Jan]");
        assert_eq!(reader.lead_member(&feb, 2).unwrap(), Some(jan98.clone()));
        assert_eq!(reader.lead_member(&feb, -2).unwrap(), None);
        let range = reader.member_range(feb.level(), &feb, &jan98).unwrap();
        let names: Vec<&str> = range.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Feb", "Apr", "Jan"]);
        assert!(reader.member_range(feb.level(), &jan98, &feb).unwrap().is_empty());
    }

    #[test]
    fn lead_far_past_either_end_is_none() {
        let src = time_source(false);
        let reader = SmartMemberReader::new(src.clone());
        let apr = member(&src, "[Time].[1997].[Q2].[Apr]");
        assert_eq!(reader.lead_member(&apr, isize::MAX).unwrap(), None);
        assert_eq!(reader.lead_member(&apr, isize::MIN).unwrap(), None);
    }

    #[test]
    fn level_count_cached_until_flush() {
        let src = time_source(false);
        let reader = SmartMemberReader::new(src.clone());
        let month = src.hierarchy.levels()[2].clone();
        assert_eq!(reader.level_member_count(&month).unwrap(), 4);
        assert_eq!(reader.level_member_count(&month).unwrap(), 4);
        assert_eq!(src.loads.load(AtomicOrdering::SeqCst), 1);
        reader.member_cache().flush_cache().unwrap();
        assert_eq!(reader.level_member_count(&month).unwrap(), 4);
        assert_eq!(src.loads.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn member_by_key_reads_through() {
        let src = time_source(false);
        let reader = SmartMemberReader::new(src.clone());
        let year = src.hierarchy.levels()[0].clone();
        let found = reader.member_by_key(&year, &KeyValue::Int(1998)).unwrap();
        assert_eq!(found.map(|m| m.name().to_string()), Some("1998".to_string()));
        reader.member_by_key(&year, &KeyValue::Int(1998)).unwrap();
        assert_eq!(src.loads.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(reader.member_by_key(&year, &KeyValue::Int(2001)).unwrap(), None);
    }
}
