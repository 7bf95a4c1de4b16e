use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// 未配置时退化为空对象存储，所有协调能力按约定放行或返回空
    pub redis_url: Option<String>,
    pub command_timeout_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Config {
            redis_url: env::var("REDIS_URL").ok(),
            command_timeout_secs: env::var("COMMAND_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis_url: None,
            command_timeout_secs: 5,
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
        }
    }
}
