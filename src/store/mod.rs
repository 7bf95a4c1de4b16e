// 键值存储客户端模块
// 统一封装远端键值引擎的访问能力，后端在启动时解析一次

pub mod memory;
pub mod null;
pub mod redis;

pub use memory::MemoryStore;
pub use null::NullStore;
pub use self::redis::RedisStore;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::StoreResult;

/// 原子复合操作
///
/// 每个变体对应一段预先声明的读写序列，在存储端作为单个不可分割
/// 单元执行，对同键的其他操作表现为要么全部生效要么全部不生效。
#[derive(Debug)]
pub enum AtomicOp<'a> {
    /// 滑动窗口准入:淘汰 score 低于 `now_ms - window_ms` 的成员、
    /// 统计剩余数量、未超限时写入 `member`（score 为 `now_ms`）并把
    /// 键的过期时间刷新为窗口长度。返回 1 表示放行，0 表示拒绝。
    WindowAdmit {
        key: &'a str,
        member: &'a str,
        now_ms: i64,
        window_ms: i64,
        max_requests: u32,
    },
}

/// 键值存储统一访问能力
///
/// 每个操作都受配置的命令超时约束，存储不可达时以
/// [`StoreError::Unavailable`](crate::error::StoreError) /
/// [`StoreError::Timeout`](crate::error::StoreError) 失败而不是无限等待。
/// ttl 参数一律以秒为单位。
#[async_trait]
pub trait KvStore: Send + Sync {
    // 字符串操作
    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn set_string_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;
    async fn get_string(&self, key: &str) -> StoreResult<Option<String>>;
    /// 原子加 delta，键不存在时按 0 处理，返回加后的值
    async fn increment(&self, key: &str, delta: i64) -> StoreResult<i64>;
    /// 键不存在时才写入并设置 ttl，返回是否写入
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool>;

    // 哈希操作
    async fn set_hash(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;
    async fn set_hash_all(&self, key: &str, entries: &HashMap<String, String>) -> StoreResult<()>;
    async fn get_hash(&self, key: &str, field: &str) -> StoreResult<Option<String>>;
    async fn get_hash_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    // 列表操作
    async fn push_list_left(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn push_list_right(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn pop_list(&self, key: &str) -> StoreResult<Option<String>>;
    /// 按下标区间读取，支持负数下标（-1 为末尾），与存储端语义一致
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    // 集合操作
    async fn add_to_set(&self, key: &str, members: &[String]) -> StoreResult<()>;
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;
    async fn is_set_member(&self, key: &str, member: &str) -> StoreResult<bool>;

    // 有序集合操作
    async fn add_to_sorted_set(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;
    async fn sorted_set_range(&self, key: &str, start: isize, stop: isize)
    -> StoreResult<Vec<String>>;
    async fn sorted_set_range_by_score(&self, key: &str, min: f64, max: f64)
    -> StoreResult<Vec<String>>;

    // 键生命周期
    async fn exists(&self, key: &str) -> StoreResult<bool>;
    /// 删除键，键不存在时同样视为成功
    async fn delete(&self, key: &str) -> StoreResult<()>;
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()>;
    /// 剩余存活秒数，-2 表示键不存在，-1 表示键无过期时间
    async fn get_ttl(&self, key: &str) -> StoreResult<i64>;

    // 原子复合执行
    async fn run_atomic(&self, op: AtomicOp<'_>) -> StoreResult<i64>;
}

/// 按配置解析存储后端，进程启动时调用一次
pub fn from_config(config: &Config) -> StoreResult<Arc<dyn KvStore>> {
    match &config.redis_url {
        Some(url) => {
            tracing::debug!("using redis kv store at {}", url);
            Ok(Arc::new(RedisStore::connect(url, config.command_timeout())?))
        }
        None => {
            tracing::warn!("REDIS_URL not configured, coordination falls back to no-op store");
            Ok(Arc::new(NullStore))
        }
    }
}
