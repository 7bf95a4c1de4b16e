use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::store::{AtomicOp, KvStore};

/// 进程内存储后端
///
/// 所有键状态在一把互斥锁后面，复合操作天然不可分割。
/// 过期采用访问时惰性回收。用于测试和未部署 Redis 的本地运行，
/// 不提供跨进程共享，生产环境应使用 [`RedisStore`](crate::store::RedisStore)。
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(HashSet<String>),
    // (member, score)，按 score 升序维护
    SortedSet(Vec<(String, f64)>),
}

impl Entry {
    fn plain(value: Value) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// 负数下标按存储端语义折算，区间为空时返回 None
fn clamp_range(start: isize, stop: isize, len: usize) -> Option<(usize, usize)> {
    let len = len as isize;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if len == 0 || start >= len || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn purge(map: &mut HashMap<String, Entry>, key: &str) {
        if map.get(key).is_some_and(Entry::expired) {
            map.remove(key);
        }
    }

    fn wrong_type(op: &'static str, key: &str) -> StoreError {
        StoreError::unavailable(op, key, "WRONGTYPE value at key")
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.lock();
        map.insert(key.to_string(), Entry::plain(Value::Str(value.to_string())));
        Ok(())
    }

    async fn set_string_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut map = self.lock();
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::Str(value) => Ok(Some(value.clone())),
                _ => Err(Self::wrong_type("get_string", key)),
            },
            None => Ok(None),
        }
    }

    async fn increment(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        if let Some(entry) = map.get_mut(key) {
            return match &mut entry.value {
                Value::Str(raw) => {
                    let current: i64 = raw.parse().map_err(|_| {
                        StoreError::unavailable("increment", key, "value is not an integer")
                    })?;
                    let next = current + delta;
                    *raw = next.to_string();
                    Ok(next)
                }
                _ => Err(Self::wrong_type("increment", key)),
            };
        }
        map.insert(key.to_string(), Entry::plain(Value::Str(delta.to_string())));
        Ok(delta)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn set_hash(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::plain(Value::Hash(HashMap::new())));
        match &mut entry.value {
            Value::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(Self::wrong_type("set_hash", key)),
        }
    }

    async fn set_hash_all(&self, key: &str, entries: &HashMap<String, String>) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut map = self.lock();
        Self::purge(&mut map, key);
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::plain(Value::Hash(HashMap::new())));
        match &mut entry.value {
            Value::Hash(fields) => {
                for (field, value) in entries {
                    fields.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            _ => Err(Self::wrong_type("set_hash_all", key)),
        }
    }

    async fn get_hash(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::Hash(fields) => Ok(fields.get(field).cloned()),
                _ => Err(Self::wrong_type("get_hash", key)),
            },
            None => Ok(None),
        }
    }

    async fn get_hash_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::Hash(fields) => Ok(fields.clone()),
                _ => Err(Self::wrong_type("get_hash_all", key)),
            },
            None => Ok(HashMap::new()),
        }
    }

    async fn push_list_left(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::plain(Value::List(VecDeque::new())));
        match &mut entry.value {
            Value::List(items) => {
                items.push_front(value.to_string());
                Ok(())
            }
            _ => Err(Self::wrong_type("push_list_left", key)),
        }
    }

    async fn push_list_right(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::plain(Value::List(VecDeque::new())));
        match &mut entry.value {
            Value::List(items) => {
                items.push_back(value.to_string());
                Ok(())
            }
            _ => Err(Self::wrong_type("push_list_right", key)),
        }
    }

    async fn pop_list(&self, key: &str) -> StoreResult<Option<String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        let (popped, now_empty) = match map.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::List(items) => {
                    let popped = items.pop_front();
                    (popped, items.is_empty())
                }
                _ => return Err(Self::wrong_type("pop_list", key)),
            },
            None => (None, false),
        };
        if now_empty {
            map.remove(key);
        }
        Ok(popped)
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::List(items) => match clamp_range(start, stop, items.len()) {
                    Some((from, to)) => Ok(items.iter().skip(from).take(to - from + 1).cloned().collect()),
                    None => Ok(Vec::new()),
                },
                _ => Err(Self::wrong_type("list_range", key)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn add_to_set(&self, key: &str, members: &[String]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }

        let mut map = self.lock();
        Self::purge(&mut map, key);
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::plain(Value::Set(HashSet::new())));
        match &mut entry.value {
            Value::Set(items) => {
                items.extend(members.iter().cloned());
                Ok(())
            }
            _ => Err(Self::wrong_type("add_to_set", key)),
        }
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::Set(items) => Ok(items.iter().cloned().collect()),
                _ => Err(Self::wrong_type("set_members", key)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn is_set_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::Set(items) => Ok(items.contains(member)),
                _ => Err(Self::wrong_type("is_set_member", key)),
            },
            None => Ok(false),
        }
    }

    async fn add_to_sorted_set(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::plain(Value::SortedSet(Vec::new())));
        match &mut entry.value {
            Value::SortedSet(members) => {
                // 重复写入同一成员等于更新 score
                members.retain(|(existing, _)| existing != member);
                members.push((member.to_string(), score));
                members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                Ok(())
            }
            _ => Err(Self::wrong_type("add_to_sorted_set", key)),
        }
    }

    async fn sorted_set_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> StoreResult<Vec<String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::SortedSet(members) => match clamp_range(start, stop, members.len()) {
                    Some((from, to)) => Ok(members[from..=to]
                        .iter()
                        .map(|(member, _)| member.clone())
                        .collect()),
                    None => Ok(Vec::new()),
                },
                _ => Err(Self::wrong_type("sorted_set_range", key)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> StoreResult<Vec<String>> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match &entry.value {
                Value::SortedSet(members) => Ok(members
                    .iter()
                    .filter(|(_, score)| *score >= min && *score <= max)
                    .map(|(member, _)| member.clone())
                    .collect()),
                _ => Err(Self::wrong_type("sorted_set_range_by_score", key)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        Ok(map.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut map = self.lock();
        map.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        if let Some(entry) = map.get_mut(key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
        }
        Ok(())
    }

    async fn get_ttl(&self, key: &str) -> StoreResult<i64> {
        let mut map = self.lock();
        Self::purge(&mut map, key);
        match map.get(key) {
            Some(entry) => match entry.expires_at {
                Some(at) => Ok(at
                    .saturating_duration_since(Instant::now())
                    .as_secs_f64()
                    .ceil() as i64),
                None => Ok(-1),
            },
            None => Ok(-2),
        }
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
                let mut map = self.lock();
                Self::purge(&mut map, key);

                let cutoff = (now_ms - window_ms) as f64;
                let current = match map.get_mut(key) {
                    Some(entry) => match &mut entry.value {
                        Value::SortedSet(members) => {
                            members.retain(|(_, score)| *score >= cutoff);
                            members.len()
                        }
                        _ => return Err(Self::wrong_type("window_admit", key)),
                    },
                    None => 0,
                };

                if current >= max_requests as usize {
                    return Ok(0);
                }

                let entry = map
                    .entry(key.to_string())
                    .or_insert_with(|| Entry::plain(Value::SortedSet(Vec::new())));
                if let Value::SortedSet(members) = &mut entry.value {
                    members.push((member.to_string(), now_ms as f64));
                    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                }
                entry.expires_at = Some(Instant::now() + Duration::from_millis(window_ms as u64));
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn string_round_trip_and_delete() {
        let store = MemoryStore::new();

        store.set_string("k", "v").await.unwrap();
        assert_eq!(store.get_string("k").await.unwrap(), Some("v".to_string()));
        assert!(store.exists("k").await.unwrap());

        store.delete("k").await.unwrap();
        assert_eq!(store.get_string("k").await.unwrap(), None);
        // 重复删除不报错
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn string_ttl_expires() {
        let store = MemoryStore::new();

        store.set_string_ex("k", "v", 1).await.unwrap();
        assert_eq!(store.get_string("k").await.unwrap(), Some("v".to_string()));
        assert!(store.get_ttl("k").await.unwrap() >= 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.get_string("k").await.unwrap(), None);
        assert_eq!(store.get_ttl("k").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn increment_starts_from_zero() {
        let store = MemoryStore::new();

        assert_eq!(store.increment("counter", 5).await.unwrap(), 5);
        assert_eq!(store.increment("counter", -2).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn set_if_absent_first_write_wins() {
        let store = MemoryStore::new();

        assert!(store.set_if_absent("lock", "a", 10).await.unwrap());
        assert!(!store.set_if_absent("lock", "b", 10).await.unwrap());
        assert_eq!(
            store.get_string("lock").await.unwrap(),
            Some("a".to_string())
        );
    }

    #[tokio::test]
    async fn hash_operations() {
        let store = MemoryStore::new();

        store.set_hash("h", "f1", "v1").await.unwrap();
        let mut rest = HashMap::new();
        rest.insert("f2".to_string(), "v2".to_string());
        store.set_hash_all("h", &rest).await.unwrap();

        assert_eq!(
            store.get_hash("h", "f1").await.unwrap(),
            Some("v1".to_string())
        );
        assert_eq!(store.get_hash("h", "missing").await.unwrap(), None);

        let all = store.get_hash_all("h").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["f2"], "v2");

        // 不存在的哈希读出来是空映射
        assert!(store.get_hash_all("absent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_operations() {
        let store = MemoryStore::new();

        store.push_list_right("l", "b").await.unwrap();
        store.push_list_right("l", "c").await.unwrap();
        store.push_list_left("l", "a").await.unwrap();

        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), ["a", "b", "c"]);
        assert_eq!(store.list_range("l", 1, 1).await.unwrap(), ["b"]);
        assert_eq!(store.pop_list("l").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.list_range("l", 5, 9).await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn set_operations() {
        let store = MemoryStore::new();

        store
            .add_to_set("s", &["a".to_string(), "b".to_string(), "a".to_string()])
            .await
            .unwrap();

        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, ["a", "b"]);
        assert!(store.is_set_member("s", "a").await.unwrap());
        assert!(!store.is_set_member("s", "c").await.unwrap());
    }

    #[tokio::test]
    async fn sorted_set_ranges() {
        let store = MemoryStore::new();

        store.add_to_sorted_set("z", "mid", 2.0).await.unwrap();
        store.add_to_sorted_set("z", "low", 1.0).await.unwrap();
        store.add_to_sorted_set("z", "high", 3.0).await.unwrap();

        assert_eq!(
            store.sorted_set_range("z", 0, -1).await.unwrap(),
            ["low", "mid", "high"]
        );
        assert_eq!(
            store.sorted_set_range_by_score("z", 1.5, 3.0).await.unwrap(),
            ["mid", "high"]
        );

        // 更新既有成员的 score
        store.add_to_sorted_set("z", "low", 9.0).await.unwrap();
        assert_eq!(
            store.sorted_set_range("z", 0, -1).await.unwrap(),
            ["mid", "high", "low"]
        );
    }

    #[tokio::test]
    async fn window_admit_respects_limit_and_evicts() {
        let store = MemoryStore::new();
        let now = 100_000;

        for i in 0..3 {
            let member = format!("{}-{}", now + i, i);
            let admitted = store
                .run_atomic(AtomicOp::WindowAdmit {
                    key: "w",
                    member: &member,
                    now_ms: now + i,
                    window_ms: 10_000,
                    max_requests: 3,
                })
                .await
                .unwrap();
            assert_eq!(admitted, 1);
        }

        let rejected = store
            .run_atomic(AtomicOp::WindowAdmit {
                key: "w",
                member: "overflow",
                now_ms: now + 3,
                window_ms: 10_000,
                max_requests: 3,
            })
            .await
            .unwrap();
        assert_eq!(rejected, 0);

        // 窗口完全滑过后旧成员被淘汰，重新放行
        let later = now + 20_000;
        let admitted = store
            .run_atomic(AtomicOp::WindowAdmit {
                key: "w",
                member: "fresh",
                now_ms: later,
                window_ms: 10_000,
                max_requests: 3,
            })
            .await
            .unwrap();
        assert_eq!(admitted, 1);
    }
}
