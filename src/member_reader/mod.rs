//! 成员读取层
//!
//! 查询求值器只面向 [`MemberReader`]。各实现的组合方式：
//!
//! ```text
//!   MemberReaderRegistry ── 每个 hierarchy 懒加载一个 reader
//!         │
//!         ├─ CacheMemberReader  小维度：构造时全量加载，之后只读
//!         └─ SmartMemberReader  大维度：MemberCacheHelper + 外部成员源，未命中时回源
//!
//!   DelegatingMemberReader  纯转发层，供上层包装只覆盖部分方法
//! ```

mod cache_reader;
mod delegating;
mod registry;
mod smart;

pub use cache_reader::CacheMemberReader;
pub use delegating::DelegatingMemberReader;
pub use registry::MemberReaderRegistry;
pub use smart::SmartMemberReader;

use std::cmp::Ordering;
use std::sync::Arc;

use crate::common::Result;
use crate::member::{Hierarchy, KeyValue, Level, Member, MemberConstraint};
use crate::member_cache::MemberCache;

/// 最小成员源契约：批量枚举 + hierarchy 身份 + 缓存写回协商
pub trait MemberSource: Send + Sync {
    fn hierarchy(&self) -> &Hierarchy;

    /// 请求成员源把加载结果写回 `cache`；返回 false 表示拒绝
    fn set_cache(&self, cache: Arc<dyn MemberCache>) -> bool;

    /// 先序（父先于子，兄弟按加载顺序）的全部成员
    fn members(&self) -> Result<Vec<Member>>;

    fn root_members(&self) -> Result<Vec<Member>>;

    fn member_children(&self, parent: &Member) -> Result<Vec<Member>>;

    fn member_count(&self) -> Result<usize>;

    fn lookup_member(&self, unique_name: &str) -> Result<Option<Member>>;
}

pub trait MemberReader: MemberSource {
    /// 同层第 n 个后继（n < 0 为前驱）；越界返回 None
    fn lead_member(&self, member: &Member, n: isize) -> Result<Option<Member>>;

    /// 同层 [start, end] 闭区间内的成员。
    ///
    /// # Panics
    /// `start` 与 `end` 不在同一层
    fn member_range(&self, level: &Level, start: &Member, end: &Member) -> Result<Vec<Member>>;

    fn members_in_level(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>>;

    fn level_member_count(&self, level: &Level) -> Result<usize>;

    fn member_children_constrained(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>>;

    fn member_parent(&self, member: &Member) -> Result<Option<Member>> {
        Ok(member.parent().cloned())
    }

    fn member_by_key(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>>;

    /// 先序位置比较；`siblings_are_equal` 时同父成员视为相等
    fn compare(&self, m1: &Member, m2: &Member, siblings_are_equal: bool) -> Result<Ordering>;

    /// 调用方命名空间 → 本 reader 命名空间
    fn substitute(&self, member: &Member) -> Member { member.clone() }

    /// `desubstitute(substitute(m)) == m`
    fn desubstitute(&self, member: &Member) -> Member { member.clone() }

    fn default_member(&self) -> Result<Option<Member>> {
        Ok(self.root_members()?.into_iter().next())
    }
}
