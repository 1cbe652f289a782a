//! 可变成员缓存
//!
//! 三张 DashMap 各自分片加锁；单键读写只持 `gate` 的共享锁。
//! `remove_member*` / `flush_cache` 持 `gate` 的独占锁，保证其他观察者
//! 看到的要么是操作前、要么是操作后的完整状态。
//!
//! 已知限制：删除成员后不会重排剩余成员的 ordinal，基于 ordinal 的
//! 兄弟 / 区间扫描在大量删除后可能看到过期位置。

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::common::Result;
use crate::member::{
    constraint_key, ConstraintKey, Hierarchy, KeyValue, Level, Member, MemberConstraint,
};
use super::MemberCache;

/// (level, key) 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub level: Level,
    pub key:   KeyValue,
}

impl MemberKey {
    pub fn new(level: &Level, key: KeyValue) -> Self {
        Self { level: level.clone(), key }
    }
}

pub struct MemberCacheHelper {
    hierarchy:          Hierarchy,
    gate:               RwLock<()>,
    /// `None` 表示已删除的墓碑槽
    key_to_member:      DashMap<MemberKey, Option<Member>>,
    member_to_children: DashMap<(Member, ConstraintKey), Vec<Member>>,
    level_to_members:   DashMap<(Level, ConstraintKey), Vec<Member>>,
}

impl MemberCacheHelper {
    pub fn new(hierarchy: Hierarchy) -> Self {
        Self {
            hierarchy,
            gate:               RwLock::new(()),
            key_to_member:      DashMap::new(),
            member_to_children: DashMap::new(),
            level_to_members:   DashMap::new(),
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy { &self.hierarchy }

    /// 未被删除的成员数
    pub fn member_count(&self) -> usize {
        let _g = self.gate.read();
        self.key_to_member.iter().filter(|e| e.value().is_some()).count()
    }

    // ── 以下 *_locked 方法要求调用方已持有 gate 的独占锁 ──────────────────────

    fn remove_locked(&self, level: &Level, key: &KeyValue) -> Option<Member> {
        // 1. 本层及同 hierarchy 更深层的成员列表都不再完整
        self.level_to_members
            .retain(|(lvl, _), _| !lvl.is_same_or_deeper_than(level));

        let cache_key = MemberKey::new(level, key.clone());
        let member = self.key_to_member
            .get(&cache_key)
            .and_then(|e| e.value().clone());

        // 2. 子成员缓存：以它为父的整体丢弃；它所在的兄弟列表，无约束的原地
        //    剔除，有约束的整体丢弃
        if let Some(member) = &member {
            let parent = member.parent();
            self.member_to_children.retain(|(p, ck), children| {
                if p == member {
                    return false;
                }
                if Some(p) == parent {
                    if *ck == ConstraintKey::Trivial {
                        children.retain(|c| c != member);
                        return true;
                    }
                    return false;
                }
                true
            });
        }

        // 3. 写墓碑，随后同键 put_member 视为全新插入
        let previous = self.key_to_member.insert(cache_key, None).flatten();
        debug!(
            level = level.unique_name(), key = %key, found = previous.is_some(),
            "member removed from cache"
        );
        previous
    }
}

impl MemberCache for MemberCacheHelper {
    fn get_member(&self, level: &Level, key: &KeyValue) -> Option<Member> {
        let _g = self.gate.read();
        self.key_to_member
            .get(&MemberKey::new(level, key.clone()))
            .and_then(|e| e.value().clone())
    }

    fn put_member(&self, level: &Level, key: KeyValue, member: Member) -> Result<Option<Member>> {
        let _g = self.gate.read();
        Ok(self.key_to_member.insert(MemberKey::new(level, key), Some(member)).flatten())
    }

    fn is_mutable(&self) -> bool { true }

    fn remove_member(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>> {
        let _g = self.gate.write();
        Ok(self.remove_locked(level, key))
    }

    fn remove_member_and_descendants(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>> {
        let _g = self.gate.write();
        let target = self.key_to_member
            .get(&MemberKey::new(level, key.clone()))
            .and_then(|e| e.value().clone());
        let Some(target) = target else {
            return Ok(self.remove_locked(level, key));
        };

        let mut descendants: Vec<Member> = self.key_to_member.iter()
            .filter_map(|e| e.value().clone())
            .filter(|m| m != &target && m.is_child_or_equal_to(&target))
            .collect();
        // 先删最深的，保证每次删除时父成员仍在缓存中
        descendants.sort_by(|a, b| b.depth().cmp(&a.depth()));
        for d in &descendants {
            self.remove_locked(d.level(), d.key());
        }
        Ok(self.remove_locked(level, key))
    }

    fn get_children_from_cache(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Option<Vec<Member>> {
        let _g = self.gate.read();
        self.member_to_children
            .get(&(parent.clone(), constraint_key(constraint)))
            .map(|e| e.value().clone())
    }

    fn get_level_members_from_cache(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Option<Vec<Member>> {
        let _g = self.gate.read();
        self.level_to_members
            .get(&(level.clone(), constraint_key(constraint)))
            .map(|e| e.value().clone())
    }

    fn put_children(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
        children:   Vec<Member>,
    ) -> Result<()> {
        let _g = self.gate.read();
        self.member_to_children.insert((parent.clone(), constraint_key(constraint)), children);
        Ok(())
    }

    fn put_level_members(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
        members:    Vec<Member>,
    ) -> Result<()> {
        let _g = self.gate.read();
        self.level_to_members.insert((level.clone(), constraint_key(constraint)), members);
        Ok(())
    }

    fn flush_cache(&self) -> Result<()> {
        let _g = self.gate.write();
        self.member_to_children.clear();
        self.key_to_member.clear();
        self.level_to_members.clear();
        for level in self.hierarchy.levels() {
            level.reset_approx_row_count();
        }
        debug!(hierarchy = self.hierarchy.name(), "member cache flushed");
        Ok(())
    }
}
