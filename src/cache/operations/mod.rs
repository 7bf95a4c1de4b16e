// 操作模块
// 每个子系统持有启动时解析好的存储句柄

pub mod cache;
pub mod counter;
pub mod rate_limit;
pub mod session;

pub use cache::CacheOperations;
pub use counter::CounterOperations;
pub use rate_limit::RateLimitOperations;
pub use session::SessionOperations;
