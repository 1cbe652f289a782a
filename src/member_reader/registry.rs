//! 每个 hierarchy 一个懒创建的 MemberReader
//!
//! 用 DashMap 的 entry API 做原子的 "不存在才创建"；同一 hierarchy 的并发
//! 请求只会触发一次创建，创建期间同分片的其他访问会等待。

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::common::Result;
use crate::config::EngineConfig;
use super::{CacheMemberReader, MemberReader, SmartMemberReader};

pub struct MemberReaderRegistry {
    config:  EngineConfig,
    readers: DashMap<String, Arc<dyn MemberReader>>,
}

impl MemberReaderRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, readers: DashMap::new() }
    }

    /// 成员数小于 `large_dimension_threshold` 时一次性全量加载，否则回源式读取
    pub fn get_or_create(&self, source: Arc<dyn MemberReader>) -> Result<Arc<dyn MemberReader>> {
        let name = source.hierarchy().name().to_string();
        let entry = self.readers
            .entry(name)
            .or_try_insert_with(|| self.create(source))?;
        Ok(entry.value().clone())
    }

    fn create(&self, source: Arc<dyn MemberReader>) -> Result<Arc<dyn MemberReader>> {
        let count = source.member_count()?;
        let small = count < self.config.large_dimension_threshold;
        debug!(
            hierarchy = source.hierarchy().name(), members = count, read_only = small,
            "creating member reader"
        );
        if small {
            let reader: Arc<dyn MemberReader> = CacheMemberReader::new(source.as_ref())?;
            Ok(reader)
        } else {
            Ok(Arc::new(SmartMemberReader::new(source)))
        }
    }

    pub fn get(&self, hierarchy: &str) -> Option<Arc<dyn MemberReader>> {
        self.readers.get(hierarchy).map(|e| e.value().clone())
    }

    /// 丢弃已创建的 reader，下次访问重新创建
    pub fn invalidate(&self, hierarchy: &str) -> bool {
        self.readers.remove(hierarchy).is_some()
    }

    pub fn len(&self) -> usize { self.readers.len() }

    pub fn is_empty(&self) -> bool { self.readers.is_empty() }
}
