//! 只读全量成员缓存
//!
//! 构造时从成员源一次性加载先序成员数组，按数组下标分配 ordinal，
//! 之后不再写入，并发读无需同步。比较、区间、lead/lag 都直接在数组上完成，
//! 不再回源。

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::common::{OlapError, Result};
use crate::member::{ConstraintKey, Hierarchy, KeyValue, Level, Member, MemberConstraint};
use crate::member_cache::{MemberCache, MemberKey};
use super::{MemberReader, MemberSource};

pub struct CacheMemberReader {
    hierarchy:     Hierarchy,
    /// members[i] 的 ordinal 为 i
    members:       Vec<Member>,
    positions:     HashMap<Member, usize>,
    key_to_member: HashMap<MemberKey, Member>,
    name_to_member: HashMap<String, Member>,
    children:      HashMap<Member, Vec<Member>>,
    level_members: HashMap<Level, Vec<Member>>,
}

impl CacheMemberReader {
    /// 成员源若接受缓存写回则报错：本缓存必须独占自己的内容
    pub fn new<S: MemberSource + ?Sized>(source: &S) -> Result<Arc<Self>> {
        let members = source.members()?;
        let mut positions      = HashMap::with_capacity(members.len());
        let mut key_to_member  = HashMap::with_capacity(members.len());
        let mut name_to_member = HashMap::with_capacity(members.len());
        let mut children: HashMap<Member, Vec<Member>> = HashMap::new();
        let mut level_members: HashMap<Level, Vec<Member>> = HashMap::new();

        for (ordinal, m) in members.iter().enumerate() {
            if !m.assign_ordinal(ordinal) && m.ordinal() != Some(ordinal) {
                trace!(member = m.unique_name(), "member already carries a different ordinal");
            }
            positions.insert(m.clone(), ordinal);
            key_to_member.insert(MemberKey::new(m.level(), m.key().clone()), m.clone());
            name_to_member.insert(m.unique_name().to_string(), m.clone());
            if let Some(p) = m.parent() {
                children.entry(p.clone()).or_default().push(m.clone());
            }
            level_members.entry(m.level().clone()).or_default().push(m.clone());
        }

        for level in source.hierarchy().levels() {
            let count = level_members.get(level).map_or(0, Vec::len);
            level.set_approx_row_count(count as i64);
        }

        let reader = Arc::new(Self {
            hierarchy: source.hierarchy().clone(),
            members, positions, key_to_member, name_to_member, children, level_members,
        });
        if source.set_cache(reader.clone()) {
            return Err(OlapError::ContractViolation(format!(
                "member source for {:?} must not accept cache write-back",
                reader.hierarchy,
            )));
        }
        debug!(
            hierarchy = reader.hierarchy.name(), members = reader.members.len(),
            "read-only member cache loaded"
        );
        Ok(reader)
    }

    /// # Panics
    /// 成员不属于本缓存（例如来自其他 hierarchy）
    fn position(&self, member: &Member) -> usize {
        *self.positions.get(member).unwrap_or_else(|| {
            panic!("member {member:?} is not held by the cache of {:?}", self.hierarchy)
        })
    }

    fn unsupported(&self, op: &str) -> OlapError {
        OlapError::unsupported(format!("{op} on read-only member cache of {:?}", self.hierarchy))
    }
}

// ── MemberCache ───────────────────────────────────────────────────────────────

impl MemberCache for CacheMemberReader {
    fn get_member(&self, level: &Level, key: &KeyValue) -> Option<Member> {
        self.key_to_member.get(&MemberKey::new(level, key.clone())).cloned()
    }

    fn put_member(&self, _level: &Level, _key: KeyValue, _member: Member) -> Result<Option<Member>> {
        Err(self.unsupported("put_member"))
    }

    fn is_mutable(&self) -> bool { false }

    fn remove_member(&self, _level: &Level, _key: &KeyValue) -> Result<Option<Member>> {
        Err(self.unsupported("remove_member"))
    }

    fn remove_member_and_descendants(&self, _level: &Level, _key: &KeyValue) -> Result<Option<Member>> {
        Err(self.unsupported("remove_member_and_descendants"))
    }

    /// 只能回答无约束的查询
    fn get_children_from_cache(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Option<Vec<Member>> {
        match crate::member::constraint_key(constraint) {
            ConstraintKey::Trivial => {
                Some(self.children.get(parent).cloned().unwrap_or_default())
            }
            ConstraintKey::Keyed(_) => None,
        }
    }

    fn get_level_members_from_cache(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Option<Vec<Member>> {
        match crate::member::constraint_key(constraint) {
            ConstraintKey::Trivial => {
                Some(self.level_members.get(level).cloned().unwrap_or_default())
            }
            ConstraintKey::Keyed(_) => None,
        }
    }

    fn put_children(
        &self,
        _parent:     &Member,
        _constraint: Option<&dyn MemberConstraint>,
        _children:   Vec<Member>,
    ) -> Result<()> {
        Err(self.unsupported("put_children"))
    }

    fn put_level_members(
        &self,
        _level:      &Level,
        _constraint: Option<&dyn MemberConstraint>,
        _members:    Vec<Member>,
    ) -> Result<()> {
        Err(self.unsupported("put_level_members"))
    }

    fn flush_cache(&self) -> Result<()> {
        Err(self.unsupported("flush_cache"))
    }
}

// ── MemberSource / MemberReader ───────────────────────────────────────────────

impl MemberSource for CacheMemberReader {
    fn hierarchy(&self) -> &Hierarchy { &self.hierarchy }

    fn set_cache(&self, _cache: Arc<dyn MemberCache>) -> bool { false }

    fn members(&self) -> Result<Vec<Member>> { Ok(self.members.clone()) }

    fn root_members(&self) -> Result<Vec<Member>> {
        Ok(self.members.iter().filter(|m| m.parent().is_none()).cloned().collect())
    }

    fn member_children(&self, parent: &Member) -> Result<Vec<Member>> {
        Ok(self.children.get(parent).cloned().unwrap_or_default())
    }

    fn member_count(&self) -> Result<usize> { Ok(self.members.len()) }

    fn lookup_member(&self, unique_name: &str) -> Result<Option<Member>> {
        Ok(self.name_to_member.get(unique_name).cloned())
    }
}

impl MemberReader for CacheMemberReader {
    fn lead_member(&self, member: &Member, n: isize) -> Result<Option<Member>> {
        let start = self.position(member);
        let level = member.level();
        let found = if n >= 0 {
            self.members[start..].iter()
                .filter(|m| m.level() == level)
                .nth(n as usize)
        } else {
            self.members[..=start].iter().rev()
                .filter(|m| m.level() == level)
                .nth(n.unsigned_abs())
        };
        Ok(found.cloned())
    }

    fn member_range(&self, _level: &Level, start: &Member, end: &Member) -> Result<Vec<Member>> {
        assert_eq!(
            start.level(), end.level(),
            "member range endpoints must share a level",
        );
        let (lo, hi) = (self.position(start), self.position(end));
        if lo > hi {
            return Ok(Vec::new());
        }
        Ok(self.members[lo..=hi].iter()
            .filter(|m| m.level() == end.level())
            .cloned()
            .collect())
    }

    fn members_in_level(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>> {
        let all = self.level_members.get(level).map(Vec::as_slice).unwrap_or(&[]);
        Ok(match constraint {
            Some(c) => all.iter().filter(|m| c.accepts(m)).cloned().collect(),
            None    => all.to_vec(),
        })
    }

    fn level_member_count(&self, level: &Level) -> Result<usize> {
        Ok(self.level_members.get(level).map_or(0, Vec::len))
    }

    fn member_children_constrained(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>> {
        let all = self.children.get(parent).map(Vec::as_slice).unwrap_or(&[]);
        Ok(match constraint {
            Some(c) => all.iter().filter(|m| c.accepts(m)).cloned().collect(),
            None    => all.to_vec(),
        })
    }

    fn member_by_key(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>> {
        Ok(self.get_member(level, key))
    }

    fn compare(&self, m1: &Member, m2: &Member, siblings_are_equal: bool) -> Result<Ordering> {
        if m1 == m2 {
            return Ok(Ordering::Equal);
        }
        if siblings_are_equal && m1.same_parent(m2) {
            return Ok(Ordering::Equal);
        }
        Ok(self.position(m1).cmp(&self.position(m2)))
    }
}
