//! 纯转发 reader
//!
//! 每个方法原样转发给被包装的 reader，自身不做任何缓存。
//! 上层包装持有一个 `DelegatingMemberReader`，只改写需要的方法，其余转发。

use std::cmp::Ordering;
use std::sync::Arc;

use crate::common::Result;
use crate::member::{Hierarchy, KeyValue, Level, Member, MemberConstraint};
use crate::member_cache::MemberCache;
use super::{MemberReader, MemberSource};

#[derive(Clone)]
pub struct DelegatingMemberReader {
    inner: Arc<dyn MemberReader>,
}

impl DelegatingMemberReader {
    pub fn new(inner: Arc<dyn MemberReader>) -> Self { Self { inner } }

    pub fn inner(&self) -> &Arc<dyn MemberReader> { &self.inner }
}

impl MemberSource for DelegatingMemberReader {
    fn hierarchy(&self) -> &Hierarchy { self.inner.hierarchy() }

    fn set_cache(&self, cache: Arc<dyn MemberCache>) -> bool { self.inner.set_cache(cache) }

    fn members(&self) -> Result<Vec<Member>> { self.inner.members() }

    fn root_members(&self) -> Result<Vec<Member>> { self.inner.root_members() }

    fn member_children(&self, parent: &Member) -> Result<Vec<Member>> {
        self.inner.member_children(parent)
    }

    fn member_count(&self) -> Result<usize> { self.inner.member_count() }

    fn lookup_member(&self, unique_name: &str) -> Result<Option<Member>> {
        self.inner.lookup_member(unique_name)
    }
}

impl MemberReader for DelegatingMemberReader {
    fn lead_member(&self, member: &Member, n: isize) -> Result<Option<Member>> {
        self.inner.lead_member(member, n)
    }

    fn member_range(&self, level: &Level, start: &Member, end: &Member) -> Result<Vec<Member>> {
        self.inner.member_range(level, start, end)
    }

    fn members_in_level(
        &self,
        level:      &Level,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>> {
        self.inner.members_in_level(level, constraint)
    }

    fn level_member_count(&self, level: &Level) -> Result<usize> {
        self.inner.level_member_count(level)
    }

    fn member_children_constrained(
        &self,
        parent:     &Member,
        constraint: Option<&dyn MemberConstraint>,
    ) -> Result<Vec<Member>> {
        self.inner.member_children_constrained(parent, constraint)
    }

    fn member_parent(&self, member: &Member) -> Result<Option<Member>> {
        self.inner.member_parent(member)
    }

    fn member_by_key(&self, level: &Level, key: &KeyValue) -> Result<Option<Member>> {
        self.inner.member_by_key(level, key)
    }

    fn compare(&self, m1: &Member, m2: &Member, siblings_are_equal: bool) -> Result<Ordering> {
        self.inner.compare(m1, m2, siblings_are_equal)
    }

    fn substitute(&self, member: &Member) -> Member { self.inner.substitute(member) }

    fn desubstitute(&self, member: &Member) -> Member { self.inner.desubstitute(member) }

    fn default_member(&self) -> Result<Option<Member>> { self.inner.default_member() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use crate::member_reader::CacheMemberReader;

    struct Fixed {
        hierarchy: Hierarchy,
        members:   Vec<Member>,
    }

    impl MemberSource for Fixed {
        fn hierarchy(&self) -> &Hierarchy { &self.hierarchy }
        fn set_cache(&self, _cache: Arc<dyn MemberCache>) -> bool { false }
        fn members(&self) -> Result<Vec<Member>> { Ok(self.members.clone()) }
        fn root_members(&self) -> Result<Vec<Member>> { Ok(self.members.clone()) }
        fn member_children(&self, _parent: &Member) -> Result<Vec<Member>> { Ok(vec![]) }
        fn member_count(&self) -> Result<usize> { Ok(self.members.len()) }
        fn lookup_member(&self, _name: &str) -> Result<Option<Member>> { Ok(None) }
    }

    fn base() -> Arc<dyn MemberReader> {
        let hierarchy = Hierarchy::new("Gender", &["Gender"]);
        let level = hierarchy.levels()[0].clone();
        let members = vec![
            Member::new(&level, None, "F", "F".into()),
            Member::new(&level, None, "M", "M".into()),
        ];
        CacheMemberReader::new(&Fixed { hierarchy, members }).unwrap()
    }

    /// 只改写 members_in_level（计数），其余走转发
    struct CountingReader {
        base:  DelegatingMemberReader,
        calls: AtomicUsize,
    }

    impl MemberSource for CountingReader {
        fn hierarchy(&self) -> &Hierarchy { self.base.hierarchy() }
        fn set_cache(&self, cache: Arc<dyn MemberCache>) -> bool { self.base.set_cache(cache) }
        fn members(&self) -> Result<Vec<Member>> { self.base.members() }
        fn root_members(&self) -> Result<Vec<Member>> { self.base.root_members() }
        fn member_children(&self, p: &Member) -> Result<Vec<Member>> { self.base.member_children(p) }
        fn member_count(&self) -> Result<usize> { self.base.member_count() }
        fn lookup_member(&self, n: &str) -> Result<Option<Member>> { self.base.lookup_member(n) }
    }

    impl MemberReader for CountingReader {
        fn lead_member(&self, m: &Member, n: isize) -> Result<Option<Member>> {
            self.base.lead_member(m, n)
        }
        fn member_range(&self, l: &Level, s: &Member, e: &Member) -> Result<Vec<Member>> {
            self.base.member_range(l, s, e)
        }
        fn members_in_level(
            &self, level: &Level, constraint: Option<&dyn MemberConstraint>,
        ) -> Result<Vec<Member>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.base.members_in_level(level, constraint)
        }
        fn level_member_count(&self, l: &Level) -> Result<usize> { self.base.level_member_count(l) }
        fn member_children_constrained(
            &self, p: &Member, c: Option<&dyn MemberConstraint>,
        ) -> Result<Vec<Member>> {
            self.base.member_children_constrained(p, c)
        }
        fn member_by_key(&self, l: &Level, k: &KeyValue) -> Result<Option<Member>> {
            self.base.member_by_key(l, k)
        }
        fn compare(&self, a: &Member, b: &Member, s: bool) -> Result<Ordering> {
            self.base.compare(a, b, s)
        }
    }

    #[test]
    fn forwards_without_change() {
        let inner = base();
        let d = DelegatingMemberReader::new(inner.clone());
        let level = inner.hierarchy().levels()[0].clone();
        let members = inner.members().unwrap();
        assert_eq!(d.members().unwrap(), members);
        assert_eq!(d.member_count().unwrap(), 2);
        assert_eq!(d.lead_member(&members[0], 1).unwrap(), Some(members[1].clone()));
        assert_eq!(
            d.compare(&members[0], &members[1], false).unwrap(),
            inner.compare(&members[0], &members[1], false).unwrap(),
        );
        assert_eq!(d.member_by_key(&level, &"M".into()).unwrap(), Some(members[1].clone()));
        assert_eq!(d.substitute(&members[0]), members[0]);
        assert_eq!(d.desubstitute(&d.substitute(&members[1])), members[1]);
        assert_eq!(d.default_member().unwrap(), Some(members[0].clone()));
    }

    #[test]
    fn partial_override_keeps_other_behaviour() {
        let r = CountingReader {
            base:  DelegatingMemberReader::new(base()),
            calls: AtomicUsize::new(0),
        };
        let level = r.hierarchy().levels()[0].clone();
        assert_eq!(r.members_in_level(&level, None).unwrap().len(), 2);
        assert_eq!(r.level_member_count(&level).unwrap(), 2);
        assert_eq!(r.calls.load(AtomicOrdering::SeqCst), 1);
    }
}
