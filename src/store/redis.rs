use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, Script};

use crate::error::{StoreError, StoreResult};
use crate::store::{AtomicOp, KvStore};

/// 滑动窗口准入脚本
/// 淘汰、计数、条件写入和 TTL 刷新在存储端一次执行完毕
const WINDOW_ADMIT_SCRIPT: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. ARGV[1])
local current = redis.call('ZCARD', KEYS[1])
if current >= tonumber(ARGV[2]) then
  return 0
end
redis.call('ZADD', KEYS[1], ARGV[3], ARGV[4])
redis.call('PEXPIRE', KEYS[1], ARGV[5])
return 1
"#;

/// Redis 存储后端
///
/// 每次操作获取一条多路复用异步连接，整个往返包在命令超时里。
pub struct RedisStore {
    client: RedisClient,
    timeout: Duration,
    window_admit: Script,
}

impl RedisStore {
    pub fn connect(url: &str, timeout: Duration) -> StoreResult<Self> {
        let client =
            RedisClient::open(url).map_err(|e| StoreError::unavailable("connect", url, e))?;

        Ok(RedisStore {
            client,
            timeout,
            window_admit: Script::new(WINDOW_ADMIT_SCRIPT),
        })
    }

    async fn run<T, F>(&self, op: &'static str, key: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::unavailable(op, key, e)),
            Err(_) => Err(StoreError::timeout(op, key)),
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        self.run("set_string", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.set(key, value).await?;
            Ok(())
        })
        .await
    }

    async fn set_string_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.run("set_string_ex", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.set_ex(key, value, ttl_secs).await?;
            Ok(())
        })
        .await
    }

    async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        self.run("get_string", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.get(key).await
        })
        .await
    }

    async fn increment(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.run("increment", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.incr(key, delta).await
        })
        .await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.run("set_if_absent", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn)
                .await?;
            Ok(reply.is_some())
        })
        .await
    }

    async fn set_hash(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.run("set_hash", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.hset(key, field, value).await?;
            Ok(())
        })
        .await
    }

    async fn set_hash_all(&self, key: &str, entries: &HashMap<String, String>) -> StoreResult<()> {
        // HSET 不接受空字段表，空会话与不存在的会话本就不可区分
        if entries.is_empty() {
            return Ok(());
        }

        self.run("set_hash_all", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let items: Vec<(&str, &str)> = entries
                .iter()
                .map(|(field, value)| (field.as_str(), value.as_str()))
                .collect();
            let _: () = conn.hset_multiple(key, &items).await?;
            Ok(())
        })
        .await
    }

    async fn get_hash(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.run("get_hash", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.hget(key, field).await
        })
        .await
    }

    async fn get_hash_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.run("get_hash_all", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.hgetall(key).await
        })
        .await
    }

    async fn push_list_left(&self, key: &str, value: &str) -> StoreResult<()> {
        self.run("push_list_left", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.lpush(key, value).await?;
            Ok(())
        })
        .await
    }

    async fn push_list_right(&self, key: &str, value: &str) -> StoreResult<()> {
        self.run("push_list_right", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.rpush(key, value).await?;
            Ok(())
        })
        .await
    }

    async fn pop_list(&self, key: &str) -> StoreResult<Option<String>> {
        self.run("pop_list", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.lpop(key, None).await
        })
        .await
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.run("list_range", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.lrange(key, start, stop).await
        })
        .await
    }

    async fn add_to_set(&self, key: &str, members: &[String]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }

        self.run("add_to_set", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.sadd(key, members).await?;
            Ok(())
        })
        .await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.run("set_members", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.smembers(key).await
        })
        .await
    }

    async fn is_set_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.run("is_set_member", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.sismember(key, member).await
        })
        .await
    }

    async fn add_to_sorted_set(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.run("add_to_sorted_set", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.zadd(key, member, score).await?;
            Ok(())
        })
        .await
    }

    async fn sorted_set_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> StoreResult<Vec<String>> {
        self.run("sorted_set_range", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.zrange(key, start, stop).await
        })
        .await
    }

    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> StoreResult<Vec<String>> {
        self.run("sorted_set_range_by_score", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.zrangebyscore(key, min, max).await
        })
        .await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.run("exists", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.exists(key).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.run("delete", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.del(key).await?;
            Ok(())
        })
        .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()> {
        self.run("expire", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.expire(key, ttl_secs as i64).await?;
            Ok(())
        })
        .await
    }

    async fn get_ttl(&self, key: &str) -> StoreResult<i64> {
        self.run("get_ttl", key, async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.ttl(key).await
        })
        .await
    }

    async fn run_atomic(&self, op: AtomicOp<'_>) -> StoreResult<i64> {
        match op {
            AtomicOp::WindowAdmit {
                key,
                member,
                now_ms,
                window_ms,
                max_requests,
            } => {
                self.run("window_admit", key, async {
                    let mut conn = self.client.get_multiplexed_async_connection().await?;
                    self.window_admit
                        .key(key)
                        .arg(now_ms - window_ms)
                        .arg(max_requests)
                        .arg(now_ms)
                        .arg(member)
                        .arg(window_ms)
                        .invoke_async(&mut conn)
                        .await
                })
                .await
            }
        }
    }
}
