use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::store::{AtomicOp, KvStore};

/// 空对象存储后端
///
/// 未配置 Redis 时的替身，约定行为:
/// - 写入被接受后丢弃，读取一律返回空 / None / 0
/// - `set_if_absent` 返回 false
/// - `increment` 返回 delta（视作从零起步，结果不保留）
/// - 滑动窗口准入一律放行（限流失效时可用性优先）
pub struct NullStore;

#[async_trait]
impl KvStore for NullStore {
    async fn set_string(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn set_string_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> StoreResult<()> {
        Ok(())
    }

    async fn get_string(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn increment(&self, _key: &str, delta: i64) -> StoreResult<i64> {
        Ok(delta)
    }

    async fn set_if_absent(&self, _key: &str, _value: &str, _ttl_secs: u64) -> StoreResult<bool> {
        Ok(false)
    }

    async fn set_hash(&self, _key: &str, _field: &str, _value: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn set_hash_all(
        &self,
        _key: &str,
        _entries: &HashMap<String, String>,
    ) -> StoreResult<()> {
        Ok(())
    }

    async fn get_hash(&self, _key: &str, _field: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn get_hash_all(&self, _key: &str) -> StoreResult<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn push_list_left(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn push_list_right(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn pop_list(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn list_range(&self, _key: &str, _start: isize, _stop: isize) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn add_to_set(&self, _key: &str, _members: &[String]) -> StoreResult<()> {
        Ok(())
    }

    async fn set_members(&self, _key: &str) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn is_set_member(&self, _key: &str, _member: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn add_to_sorted_set(&self, _key: &str, _member: &str, _score: f64) -> StoreResult<()> {
        Ok(())
    }

    async fn sorted_set_range(
        &self,
        _key: &str,
        _start: isize,
        _stop: isize,
    ) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn sorted_set_range_by_score(
        &self,
        _key: &str,
        _min: f64,
        _max: f64,
    ) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn expire(&self, _key: &str, _ttl_secs: u64) -> StoreResult<()> {
        Ok(())
    }

    async fn get_ttl(&self, _key: &str) -> StoreResult<i64> {
        Ok(-2)
    }

    async fn run_atomic(&self, op: AtomicOp<'_>) -> StoreResult<i64> {
        match op {
            AtomicOp::WindowAdmit { .. } => Ok(1),
        }
    }
}
