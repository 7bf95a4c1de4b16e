// 协调层模块
// 包含键命名与缓存、计数器、限流、会话四类操作逻辑

pub mod keys;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use operations::{CacheOperations, CounterOperations, RateLimitOperations, SessionOperations};
