//! # rolap-cache-engine
//!
//! ROLAP 引擎的内存寻址与缓存核心：
//! - **坐标编解码**：CellKey / Modulos，N 维坐标 ↔ 平铺偏移
//! - **成员缓存层**：MemberCache / MemberCacheHelper，按 (level, key) 缓存成员，带 children / level 索引与安全失效
//! - **成员读取层**：MemberReader 及其只读缓存、回源、转发三种实现
//! - **Galaxy**：多个事实表 / 聚合表之间的列统一，以及最便宜聚合表的选择
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         查询求值器                            │
//! │      │ children / range / compare            │ cell 请求      │
//! │      ▼                                       ▼               │
//! │ ┌──────────────────────┐          ┌────────────────────────┐ │
//! │ │ MemberReaderRegistry │          │      RolapGalaxy       │ │
//! │ │  (DashMap, 每 H 一个) │          │  全局序号 + find_agg    │ │
//! │ └─────────┬────────────┘          └───────────┬────────────┘ │
//! │   ┌───────┴──────────┐                        │              │
//! │ CacheMemberReader  SmartMemberReader         Star × N        │
//! │  (只读, 序号数组)      │                    (按 cost 排序)      │
//! │                   MemberCacheHelper                          │
//! │                   ├─ key → member                            │
//! │                   ├─ (member, constraint) → children         │
//! │                   └─ (level, constraint)  → members          │
//! │                        │ miss                                │
//! │                        ▼                                     │
//! │                   MemberSource（外部 SQL 加载器）              │
//! │                                                              │
//! │ SegmentDataset (Dense / Sparse) ←── CellKey / Modulos        │
//! │   └─ SegmentBody codec (LZ4 / None + CRC32)                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

// ── 基础 ──────────────────────────────────────────────────────────────────────
pub mod common;
pub mod config;
pub mod bitkey;

// ── 坐标编解码 ────────────────────────────────────────────────────────────────
pub mod cell_key;
pub mod modulos;

// ── 成员缓存与读取 ────────────────────────────────────────────────────────────
pub mod member;
pub mod member_cache;
pub mod member_reader;

// ── Galaxy ────────────────────────────────────────────────────────────────────
pub mod galaxy;

// ── Segment ───────────────────────────────────────────────────────────────────
pub mod segment;
pub mod compression;
