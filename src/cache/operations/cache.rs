use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::keys;
use crate::error::{StoreError, StoreResult};
use crate::store::KvStore;

/// 缓存操作
///
/// 值以 JSON 字符串进入存储，序列化在调用方类型边界完成。
/// 存储端是唯一权威，本层不保留任何本地副本。
#[derive(Clone)]
pub struct CacheOperations {
    store: Arc<dyn KvStore>,
}

impl CacheOperations {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// 写入缓存条目，ttl 秒后由存储端自动回收
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> StoreResult<()> {
        let cache_key = keys::cache_key(key);
        let json = serde_json::to_string(value)
            .map_err(|e| StoreError::serialization("cache_set", &cache_key, e))?;

        self.store.set_string_ex(&cache_key, &json, ttl_secs).await
    }

    /// 读取缓存条目，不存在或已过期时返回 None
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let cache_key = keys::cache_key(key);
        match self.store.get_string(&cache_key).await? {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| StoreError::serialization("cache_get", &cache_key, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 删除缓存条目，键不存在时同样视为成功
    pub async fn invalidate(&self, key: &str) -> StoreResult<()> {
        self.store.delete(&keys::cache_key(key)).await
    }
}
