use std::sync::Arc;

use uuid::Uuid;

use crate::cache::keys;
use crate::config::Config;
use crate::store::{AtomicOp, KvStore};

/// 滑动窗口限流操作
///
/// 窗口状态保存在远端存储，同一配额对服务的所有实例生效。
/// 每次检查在一个原子单元内完成旧成员淘汰、计数和条件写入，
/// 放行时把窗口键的过期时间刷新为窗口长度，闲置窗口由存储端回收。
///
/// 存储不可用时检查放行，限流是尽力而为的。
#[derive(Clone)]
pub struct RateLimitOperations {
    store: Arc<dyn KvStore>,
    max_requests: u32,
    window_secs: u64,
}

impl RateLimitOperations {
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Self {
        Self {
            store,
            max_requests: config.rate_limit_requests,
            window_secs: config.rate_limit_window_secs,
        }
    }

    /// 按配置的默认配额检查准入，返回是否放行
    pub async fn check(&self, key: &str) -> bool {
        self.check_with(key, self.max_requests, self.window_secs)
            .await
    }

    /// 按调用方给定的配额检查准入，返回是否放行
    pub async fn check_with(&self, key: &str, max_requests: u32, window_secs: u64) -> bool {
        let window_key = keys::rate_limit_key(key);
        let now_ms = chrono::Utc::now().timestamp_millis();
        // 同一毫秒到达的请求靠随机后缀区分有序集合成员
        let member = format!("{}-{}", now_ms, Uuid::new_v4().simple());

        let admit = self
            .store
            .run_atomic(AtomicOp::WindowAdmit {
                key: &window_key,
                member: &member,
                now_ms,
                window_ms: window_secs as i64 * 1000,
                max_requests,
            })
            .await;

        match admit {
            Ok(result) => result == 1,
            Err(e) => {
                tracing::warn!("rate limit check failed for {}, allowing request: {}", key, e);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RedisStore};
    use futures_util::future::join_all;
    use std::time::Duration;

    fn limiter(max_requests: u32, window_secs: u64) -> (RateLimitOperations, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Config {
            rate_limit_requests: max_requests,
            rate_limit_window_secs: window_secs,
            ..Config::default()
        };
        (RateLimitOperations::new(store.clone(), &config), store)
    }

    #[tokio::test]
    async fn admits_exactly_up_to_the_limit() {
        let (limiter, _) = limiter(3, 10);

        let mut admitted = 0;
        for _ in 0..5 {
            if limiter.check("client-ip").await {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
    }

    #[tokio::test]
    async fn concurrent_checks_admit_exactly_the_quota() {
        let (limiter, _) = limiter(3, 10);

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("api-key").await })
            })
            .collect();

        let admitted = join_all(tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();
        assert_eq!(admitted, 3);
    }

    #[tokio::test]
    async fn quota_returns_after_window_slides() {
        let (limiter, _) = limiter(2, 1);

        assert!(limiter.check("k").await);
        assert!(limiter.check("k").await);
        assert!(!limiter.check("k").await);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check("k").await);
    }

    #[tokio::test]
    async fn separate_keys_have_separate_windows() {
        let (limiter, _) = limiter(1, 10);

        assert!(limiter.check("a").await);
        assert!(!limiter.check("a").await);
        assert!(limiter.check("b").await);
    }

    #[tokio::test]
    async fn window_key_is_namespaced_and_carries_ttl() {
        let (limiter, store) = limiter(3, 10);

        assert!(limiter.check("client").await);
        assert!(store.exists("ratelimit:client").await.unwrap());
        assert!(store.get_ttl("ratelimit:client").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn unreachable_store_fails_open() {
        // 端口 1 上没有任何服务，连接立即失败
        let store = RedisStore::connect("redis://127.0.0.1:1/", Duration::from_millis(500))
            .expect("client construction is lazy");
        let config = Config {
            rate_limit_requests: 0,
            ..Config::default()
        };
        let limiter = RateLimitOperations::new(Arc::new(store), &config);

        // 配额为 0 也放行，说明走的是失败放行路径
        assert!(limiter.check("any").await);
    }
}
