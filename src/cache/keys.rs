/// 缓存条目键前缀
pub const CACHE_PREFIX: &str = "cache:";

/// 会话键前缀
pub const SESSION_PREFIX: &str = "session:";

/// 限流窗口键前缀
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

/// 生成缓存条目键
pub fn cache_key(key: &str) -> String {
    format!("{}{}", CACHE_PREFIX, key)
}

/// 生成会话键
pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

/// 生成限流窗口键
pub fn rate_limit_key(key: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, key)
}
