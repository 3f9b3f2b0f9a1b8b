use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use glob::Pattern;
use tokio::sync::Mutex;

use crate::error::StoreError;

use super::{KeyValueStore, StoreCommand};

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

struct SortedSetEntry {
    /// (member, score)，按插入顺序保存，计数前按分数剪枝
    members: Vec<(String, f64)>,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct MemoryInner {
    strings: HashMap<String, StringEntry>,
    sorted_sets: HashMap<String, SortedSetEntry>,
}

/// 进程内存储实现
///
/// 测试与本地开发用，语义对齐 Redis：TTL 过期、glob 键匹配、
/// 管道在单把锁内整体执行，等价于 MULTI 管道的原子性。
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    fn purge(inner: &mut MemoryInner) {
        let now = Instant::now();
        inner
            .strings
            .retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        inner
            .sorted_sets
            .retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
    }

    fn apply(inner: &mut MemoryInner, command: &StoreCommand) -> i64 {
        match command {
            StoreCommand::ZAdd { key, score, member } => {
                let entry = inner
                    .sorted_sets
                    .entry(key.clone())
                    .or_insert_with(|| SortedSetEntry {
                        members: Vec::new(),
                        expires_at: None,
                    });
                match entry.members.iter_mut().find(|(m, _)| m == member) {
                    Some((_, existing)) => {
                        *existing = *score;
                        0
                    }
                    None => {
                        entry.members.push((member.clone(), *score));
                        1
                    }
                }
            }
            StoreCommand::ZRemRangeByScore { key, min, max } => {
                match inner.sorted_sets.get_mut(key) {
                    Some(entry) => {
                        let before = entry.members.len();
                        entry.members.retain(|(_, s)| *s < *min || *s > *max);
                        (before - entry.members.len()) as i64
                    }
                    None => 0,
                }
            }
            StoreCommand::ZCard { key } => inner
                .sorted_sets
                .get(key)
                .map(|entry| entry.members.len() as i64)
                .unwrap_or(0),
            StoreCommand::Expire { key, ttl_secs } => {
                let deadline = Instant::now() + Duration::from_secs(*ttl_secs);
                if let Some(entry) = inner.sorted_sets.get_mut(key) {
                    entry.expires_at = Some(deadline);
                    1
                } else if let Some(entry) = inner.strings.get_mut(key) {
                    entry.expires_at = Some(deadline);
                    1
                } else {
                    0
                }
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn is_initialized(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        Ok(inner.strings.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        let removed =
            inner.strings.remove(key).is_some() | inner.sorted_sets.remove(key).is_some();
        Ok(removed)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        let mut removed = 0;
        for key in keys {
            if inner.strings.remove(key).is_some() | inner.sorted_sets.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let matcher = Pattern::new(pattern).map_err(|e| {
            StoreError::Operation(::redis::RedisError::from((
                ::redis::ErrorKind::ClientError,
                "无效的键模式",
                e.to_string(),
            )))
        })?;

        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        let mut found: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.sorted_sets.keys())
            .filter(|key| matcher.matches(key))
            .cloned()
            .collect();
        found.sort();
        Ok(found)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        Ok(inner.strings.contains_key(key) || inner.sorted_sets.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        let expires_at = if let Some(entry) = inner.strings.get(key) {
            entry.expires_at
        } else if let Some(entry) = inner.sorted_sets.get(key) {
            entry.expires_at
        } else {
            return Ok(-2);
        };
        Ok(match expires_at {
            Some(at) => at
                .saturating_duration_since(Instant::now())
                .as_secs_f64()
                .ceil() as i64,
            None => -1,
        })
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        Ok(Self::apply(
            &mut inner,
            &StoreCommand::Expire {
                key: key.to_string(),
                ttl_secs,
            },
        ) == 1)
    }

    async fn pipeline(&self, commands: &[StoreCommand]) -> Result<Vec<i64>, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::purge(&mut inner);
        Ok(commands
            .iter()
            .map(|command| Self::apply(&mut inner, command))
            .collect())
    }
}
