// 面向公开 API 的端到端测试
// 用进程内后端覆盖装配和四个子系统的协同，空对象后端覆盖未配置存储的退化路径

use std::collections::HashMap;
use std::sync::Arc;

use coordination::CoordinationState;
use coordination::config::Config;
use coordination::store::MemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn memory_state(max_requests: u32, window_secs: u64) -> CoordinationState {
    init_tracing();
    let config = Config {
        rate_limit_requests: max_requests,
        rate_limit_window_secs: window_secs,
        ..Config::default()
    };
    CoordinationState::with_store(config, Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn subsystems_share_one_store_without_key_collisions() {
    let state = memory_state(3, 10);

    state.cache.set("abc", &"cached", 60).await.unwrap();

    let mut fields = HashMap::new();
    fields.insert("user".to_string(), "u-1".to_string());
    state.sessions.set_session("abc", &fields, 60).await.unwrap();

    assert!(state.rate_limiter.check("abc").await);
    state.counters.increment("abc", 1).await.unwrap();

    // 同名标识分属不同命名空间，互不覆盖
    assert_eq!(
        state.cache.get::<String>("abc").await.unwrap(),
        Some("cached".to_string())
    );
    assert_eq!(state.sessions.get_session("abc").await.unwrap(), fields);
    assert_eq!(state.counters.get("abc").await.unwrap(), 1);
}

#[tokio::test]
async fn rate_limiter_and_counter_work_through_state() {
    let state = memory_state(2, 10);

    assert!(state.rate_limiter.check("ip").await);
    assert!(state.rate_limiter.check("ip").await);
    assert!(!state.rate_limiter.check("ip").await);

    assert_eq!(state.counters.increment("seen", 4).await.unwrap(), 4);
    assert!(state.counters.set_if_absent("leader", "me", 30).await.unwrap());
    assert!(!state.counters.set_if_absent("leader", "other", 30).await.unwrap());
}

#[tokio::test]
async fn unconfigured_store_degrades_to_null_backend() {
    init_tracing();
    let config = Config {
        redis_url: None,
        ..Config::default()
    };
    let state = CoordinationState::from_config(config).unwrap();

    // 写入被丢弃，读取为空
    state.cache.set("k", &"v", 60).await.unwrap();
    assert_eq!(state.cache.get::<String>("k").await.unwrap(), None);
    assert!(state.sessions.get_session("any").await.unwrap().is_empty());

    // 限流退化为放行
    assert!(state.rate_limiter.check("ip").await);
}
