use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::keys;
use crate::error::StoreResult;
use crate::store::KvStore;

/// 会话操作
///
/// 会话以哈希整键存储，TTL 作用于整个键。`get_session` 对不存在的
/// 会话返回空映射，与空会话不作区分，需要区分时用 [`Self::session_exists`]。
#[derive(Clone)]
pub struct SessionOperations {
    store: Arc<dyn KvStore>,
}

impl SessionOperations {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// 写入全部会话字段并设置整键 ttl
    ///
    /// 写字段和设过期是两次调用，不构成原子单元，中途失败会留下
    /// 无过期时间的会话。需要严格原子性的调用方应走
    /// [`KvStore::run_atomic`] 组装自己的复合单元。
    pub async fn set_session(
        &self,
        session_id: &str,
        fields: &HashMap<String, String>,
        ttl_secs: u64,
    ) -> StoreResult<()> {
        let key = keys::session_key(session_id);
        self.store.set_hash_all(&key, fields).await?;
        self.store.expire(&key, ttl_secs).await
    }

    /// 读取全部会话字段，会话不存在时返回空映射
    pub async fn get_session(&self, session_id: &str) -> StoreResult<HashMap<String, String>> {
        self.store
            .get_hash_all(&keys::session_key(session_id))
            .await
    }

    /// 删除会话，重复删除不报错
    pub async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        self.store.delete(&keys::session_key(session_id)).await
    }

    /// 判断会话键是否存在，用于区分空会话和未创建的会话
    pub async fn session_exists(&self, session_id: &str) -> StoreResult<bool> {
        self.store.exists(&keys::session_key(session_id)).await
    }
}
