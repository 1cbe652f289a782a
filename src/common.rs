//! 全局基础类型与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

/// 星型模型（事实表 / 聚合表）的别名，在一个 Galaxy 内唯一
pub type StarId        = String;
/// Galaxy 全局列序号
pub type GlobalOrdinal = usize;
/// 星内局部 bit 位置
pub type LocalOrdinal  = usize;

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OlapError {
    /// 不可变缓存上的写操作，或某种 reader 组合故意不实现的方法
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("contract violation: {0}")]
    ContractViolation(String),
    /// Galaxy 构建期的 schema 元数据不一致，对所属 cube 是致命的
    #[error("schema inconsistency: {0}")]
    SchemaInconsistency(String),
    #[error("member not found: {0}")]
    MemberNotFound(String),
    #[error("star not found: {0}")]
    StarNotFound(String),
    /// 外部协作者（SQL 成员源等）抛出的错误，原样上抛
    #[error("member source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("segment codec error: {0}")]
    Codec(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("config error: {0}")]
    Config(String),
}

impl OlapError {
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }
}

pub type Result<T> = std::result::Result<T, OlapError>;
