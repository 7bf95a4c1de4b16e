use std::sync::Arc;

use config::Config;
use store::KvStore;

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{CacheOperations, CounterOperations, RateLimitOperations, SessionOperations};
pub use error::{StoreError, StoreResult};

/// 协调层状态
///
/// 启动时按配置解析一次存储后端，四个子系统共享同一个句柄。
#[derive(Clone)]
pub struct CoordinationState {
    pub config: Config,
    pub store: Arc<dyn KvStore>,
    pub cache: CacheOperations,
    pub counters: CounterOperations,
    pub rate_limiter: RateLimitOperations,
    pub sessions: SessionOperations,
}

impl CoordinationState {
    /// 按配置解析存储后端并装配各子系统
    pub fn from_config(config: Config) -> StoreResult<Self> {
        let store = store::from_config(&config)?;
        Ok(Self::with_store(config, store))
    }

    /// 用外部给定的存储句柄装配，测试和自定义后端走这里
    pub fn with_store(config: Config, store: Arc<dyn KvStore>) -> Self {
        Self {
            cache: CacheOperations::new(store.clone()),
            counters: CounterOperations::new(store.clone()),
            rate_limiter: RateLimitOperations::new(store.clone(), &config),
            sessions: SessionOperations::new(store.clone()),
            config,
            store,
        }
    }
}
