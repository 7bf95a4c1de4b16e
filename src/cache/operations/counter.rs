use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::store::KvStore;

/// 原子计数器操作
///
/// 计数直接落在存储端的原子加法上，任意数量的并发调用方
/// 不会丢失更新。计数器键由调用方全权指定，不加前缀。
#[derive(Clone)]
pub struct CounterOperations {
    store: Arc<dyn KvStore>,
}

impl CounterOperations {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// 原子加 delta，键不存在时从 0 起步，返回加后的值
    pub async fn increment(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.store.increment(key, delta).await
    }

    /// 键不存在时才写入并设置 ttl，返回是否写入
    /// 可作为跨实例互斥的轻量构件
    pub async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.store.set_if_absent(key, value, ttl_secs).await
    }

    /// 读取当前值，键不存在时为 0
    pub async fn get(&self, key: &str) -> StoreResult<i64> {
        match self.store.get_string(key).await? {
            Some(raw) => raw
                .parse()
                .map_err(|e| StoreError::serialization("counter_get", key, e)),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use futures_util::future::join_all;

    fn counters() -> CounterOperations {
        CounterOperations::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn increment_treats_absent_as_zero() {
        let counters = counters();

        assert_eq!(counters.get("hits").await.unwrap(), 0);
        assert_eq!(counters.increment("hits", 3).await.unwrap(), 3);
        assert_eq!(counters.increment("hits", -1).await.unwrap(), 2);
        assert_eq!(counters.get("hits").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_increments_lose_nothing() {
        let counters = counters();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let counters = counters.clone();
                tokio::spawn(async move { counters.increment("hits", 2).await.unwrap() })
            })
            .collect();
        join_all(tasks).await;

        assert_eq!(counters.get("hits").await.unwrap(), 100);
    }

    #[tokio::test]
    async fn set_if_absent_only_first_caller_wins() {
        let counters = counters();

        assert!(counters.set_if_absent("lock", "owner-a", 10).await.unwrap());
        assert!(!counters.set_if_absent("lock", "owner-b", 10).await.unwrap());
    }
}
