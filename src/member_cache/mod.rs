//! 成员缓存层
//!
//! ```text
//!   ┌───────────────────────── MemberCache ─────────────────────────┐
//!   │  (level, key)        → Member          单键读写，无全局锁     │
//!   │  (member, constraint) → [children]     有序子成员列表         │
//!   │  (level,  constraint) → [members]      某层全部成员           │
//!   └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! 两种实现：
//! - [`MemberCacheHelper`]：可变、并发安全，支持按 key 删除并级联失效
//! - `CacheMemberReader`：构造时一次性加载，之后只读，写操作返回 `Unsupported`

mod helper;

pub use helper::{MemberCacheHelper, MemberKey};

use crate::common::Result;
use crate::member::{KeyValue, Level, Member, MemberConstraint};

pub trait MemberCache: Send + Sync {
    fn get_member(&self, level: &Level, key: &KeyValue) -> Option<Member>;

    /// 插入或替换，返回原有成员
    fn put_member(&self, level: &Level, key: KeyValue, member: Member) -> Result<Option<Member>>;

    fn is_mutable(&self) -> bool;

    /// 删除成员并级联失效相关的子成员 / 层成员列表，返回被删成员
    fn remove_member(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>>;

    fn remove_member_and_descendants(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>>;

    /// `constraint == None` 与无约束共享同一缓存槽
    fn get_children_from_cache(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Option<Vec<Member>>;

    fn get_level_members_from_cache(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Option<Vec<Member>>;

    fn put_children(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
        children:   Vec<Member>,
    ) -> Result<()>;

    fn put_level_members(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
        members:    Vec<Member>,
    ) -> Result<()>;

    /// 清空全部缓存，并把所属 hierarchy 各层的近似行数重置为未知
    fn flush_cache(&self) -> Result<()>;
}
