//! 内存存储
//!
//! 使用 DashMap 实现的并发内存存储，按订单号索引。

use dashmap::DashMap;
use std::sync::Arc;

/// 按订单号索引的内存存储
///
/// 克隆后共享同一份数据。
#[derive(Debug)]
pub struct MemoryStore<T> {
    data: Arc<DashMap<String, T>>,
}

impl<T: Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// 插入或覆盖
    pub fn insert(&self, key: &str, value: T) {
        self.data.insert(key.to_string(), value);
    }

    /// 返回数据的克隆，不持有锁
    pub fn get(&self, key: &str) -> Option<T> {
        self.data.get(key).map(|v| v.clone())
    }

    /// 取出（不存在时用 `init` 创建）并在分片锁内修改，返回修改后的克隆
    ///
    /// 同一订单号的并发请求在这里串行化
    pub fn upsert_with<I, F>(&self, key: &str, init: I, modify: F) -> T
    where
        I: FnOnce() -> T,
        F: FnOnce(&mut T),
    {
        let mut entry = self.data.entry(key.to_string()).or_insert_with(init);
        modify(entry.value_mut());
        entry.value().clone()
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl<T: Clone> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}
