//! 维度成员模型：Hierarchy / Level / Member / 成员键 / 成员约束
//!
//! 这些对象由外部 schema 层解析产生，缓存层只依赖它们的身份与父子关系。
//! 句柄都是 `Arc` 包装，克隆廉价。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

/// 近似行数未知时的哨兵值
pub const UNKNOWN_ROW_COUNT: i64 = i64::MIN;

// ── Level ─────────────────────────────────────────────────────────────────────

struct LevelInner {
    unique_name:      String,
    name:             String,
    hierarchy:        String,
    depth:            usize,
    approx_row_count: AtomicI64,
}

#[derive(Clone)]
pub struct Level(Arc<LevelInner>);

impl Level {
    pub fn new(hierarchy: &str, name: &str, depth: usize) -> Self {
        Self(Arc::new(LevelInner {
            unique_name:      format!("[{hierarchy}].[{name}]"),
            name:             name.into(),
            hierarchy:        hierarchy.into(),
            depth,
            approx_row_count: AtomicI64::new(UNKNOWN_ROW_COUNT),
        }))
    }

    pub fn unique_name(&self)    -> &str  { &self.0.unique_name }
    pub fn name(&self)           -> &str  { &self.0.name }
    pub fn hierarchy_name(&self) -> &str  { &self.0.hierarchy }
    pub fn depth(&self)          -> usize { self.0.depth }

    /// 未知时返回 `UNKNOWN_ROW_COUNT`
    pub fn approx_row_count(&self) -> i64 {
        self.0.approx_row_count.load(AtomicOrdering::Relaxed)
    }

    pub fn set_approx_row_count(&self, count: i64) {
        self.0.approx_row_count.store(count, AtomicOrdering::Relaxed);
    }

    pub fn reset_approx_row_count(&self) {
        self.set_approx_row_count(UNKNOWN_ROW_COUNT);
    }

    /// 同一 hierarchy 且深度不小于 `other`
    pub fn is_same_or_deeper_than(&self, other: &Level) -> bool {
        self.hierarchy_name() == other.hierarchy_name() && self.depth() >= other.depth()
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.unique_name == other.0.unique_name
    }
}
impl Eq for Level {}

impl Hash for Level {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.unique_name.hash(state); }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.unique_name)
    }
}

// ── Hierarchy ─────────────────────────────────────────────────────────────────

struct HierarchyInner {
    name:   String,
    levels: Vec<Level>,
}

#[derive(Clone)]
pub struct Hierarchy(Arc<HierarchyInner>);

impl Hierarchy {
    /// 依次创建各层 Level，depth 从 0 开始
    pub fn new(name: &str, level_names: &[&str]) -> Self {
        let levels = level_names.iter()
            .enumerate()
            .map(|(depth, l)| Level::new(name, l, depth))
            .collect();
        Self(Arc::new(HierarchyInner { name: name.into(), levels }))
    }

    pub fn name(&self)              -> &str            { &self.0.name }
    pub fn levels(&self)            -> &[Level]        { &self.0.levels }
    pub fn level(&self, depth: usize) -> Option<&Level> { self.0.levels.get(depth) }

    pub fn owns(&self, level: &Level) -> bool {
        level.hierarchy_name() == self.name()
    }
}

impl PartialEq for Hierarchy {
    fn eq(&self, other: &Self) -> bool { self.0.name == other.0.name }
}
impl Eq for Hierarchy {}

impl fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.name)
    }
}

// ── 成员键 ────────────────────────────────────────────────────────────────────

/// 成员在其 Level 内的键：单值或有序复合值
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Null,
    Int(i64),
    Str(Arc<str>),
    Composite(Vec<KeyValue>),
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self { Self::Str(v.into()) }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null         => write!(f, "#null"),
            Self::Int(v)       => write!(f, "{v}"),
            Self::Str(s)       => write!(f, "{s}"),
            Self::Composite(parts) => {
                write!(f, "(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ── Member ────────────────────────────────────────────────────────────────────

struct MemberInner {
    unique_name: String,
    name:        String,
    key:         KeyValue,
    level:       Level,
    parent:      Option<Member>,
    /// 只在批量加载时赋值一次，之后不再重排
    ordinal:     OnceLock<usize>,
}

#[derive(Clone)]
pub struct Member(Arc<MemberInner>);

impl Member {
    pub fn new(level: &Level, parent: Option<&Member>, name: &str, key: KeyValue) -> Self {
        let unique_name = match parent {
            Some(p) => format!("{}.[{name}]", p.unique_name()),
            None    => format!("[{}].[{name}]", level.hierarchy_name()),
        };
        Self(Arc::new(MemberInner {
            unique_name,
            name: name.into(),
            key,
            level: level.clone(),
            parent: parent.cloned(),
            ordinal: OnceLock::new(),
        }))
    }

    pub fn unique_name(&self) -> &str            { &self.0.unique_name }
    pub fn name(&self)        -> &str            { &self.0.name }
    pub fn key(&self)         -> &KeyValue       { &self.0.key }
    pub fn level(&self)       -> &Level          { &self.0.level }
    pub fn parent(&self)      -> Option<&Member> { self.0.parent.as_ref() }
    pub fn depth(&self)       -> usize           { self.0.level.depth() }

    pub fn hierarchy_name(&self) -> &str { self.0.level.hierarchy_name() }

    pub fn ordinal(&self) -> Option<usize> { self.0.ordinal.get().copied() }

    /// 已经赋过值则保持原值并返回 false
    pub fn assign_ordinal(&self, ordinal: usize) -> bool {
        self.0.ordinal.set(ordinal).is_ok()
    }

    pub fn same_parent(&self, other: &Member) -> bool {
        self.parent() == other.parent()
    }

    /// self 是否等于 `ancestor` 或为其后代
    pub fn is_child_or_equal_to(&self, ancestor: &Member) -> bool {
        let mut cur = Some(self);
        while let Some(m) = cur {
            if m == ancestor {
                return true;
            }
            cur = m.parent();
        }
        false
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.unique_name == other.0.unique_name
    }
}
impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.unique_name.hash(state); }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.unique_name)
    }
}

// ── 成员约束 ──────────────────────────────────────────────────────────────────

/// 约束在缓存中的身份；语义相同的约束必须产生相同的 key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKey {
    Trivial,
    Keyed(String),
}

/// 外部传入的成员过滤约束。缓存层只用 `cache_key` 区分缓存槽，
/// 过滤本身由约束对象或成员源完成。
pub trait MemberConstraint: Send + Sync + fmt::Debug {
    fn cache_key(&self) -> ConstraintKey;

    fn is_trivial(&self) -> bool {
        self.cache_key() == ConstraintKey::Trivial
    }

    fn accepts(&self, _member: &Member) -> bool { true }
}

/// 无约束
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMemberConstraint;

impl MemberConstraint for DefaultMemberConstraint {
    fn cache_key(&self) -> ConstraintKey { ConstraintKey::Trivial }
}

/// 只保留指定名称的子成员
#[derive(Debug, Clone)]
pub struct ChildByNameConstraint {
    names: Vec<String>,
}

impl ChildByNameConstraint {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self { names }
    }
}

impl MemberConstraint for ChildByNameConstraint {
    fn cache_key(&self) -> ConstraintKey {
        ConstraintKey::Keyed(format!("child-by-name:{}", self.names.join("|")))
    }

    fn accepts(&self, member: &Member) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(member.name())).is_ok()
    }
}

/// `None` 归一化为无约束
pub fn constraint_key(constraint: Option<&dyn MemberConstraint>) -> ConstraintKey {
    constraint.map_or(ConstraintKey::Trivial, |c| c.cache_key())
}
