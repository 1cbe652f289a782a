//! 引擎配置
//!
//! ```toml
//! use_aggregates                   = true
//! large_dimension_threshold        = 100
//! sparse_segment_count_threshold   = 1000
//! sparse_segment_density_threshold = 0.5
//! segment_compression              = "lz4"
//! ```

use serde::Deserialize;
use crate::common::{OlapError, Result};

/// 序列化 segment body 时使用的压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    Lz4,
}

impl CompressionType {
    pub fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lz4  => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Lz4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// 关闭后 `RolapGalaxy::find_agg` 总是返回 None
    pub use_aggregates:                   bool,
    /// 成员数低于该阈值的 hierarchy 使用一次性全量加载的 CacheMemberReader
    pub large_dimension_threshold:        usize,
    pub sparse_segment_count_threshold:   usize,
    pub sparse_segment_density_threshold: f64,
    pub segment_compression:              CompressionType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_aggregates:                   true,
            large_dimension_threshold:        100,
            sparse_segment_count_threshold:   1000,
            sparse_segment_density_threshold: 0.5,
            segment_compression:              CompressionType::Lz4,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| OlapError::Config(e.to_string()))
    }
}
