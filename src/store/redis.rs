use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::StoreError;

use super::{KeyValueStore, StoreCommand};

/// Redis 存储客户端
///
/// 生命周期显式管理：启动时 `initialize`，停止时 `close`。
/// 未初始化期间所有操作返回 `StoreError::Unavailable`，
/// 由上层组件决定 fail-open 行为。
pub struct RedisStore {
    client: RwLock<Option<redis::Client>>,
    initialized: AtomicBool,
}

impl RedisStore {
    pub fn new() -> Self {
        RedisStore {
            client: RwLock::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// 建立连接并用 PING 验证（应用启动时调用）
    pub async fn initialize(&self, config: &Config) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Relaxed) {
            return Ok(());
        }

        tracing::info!(
            "Initializing Redis connection: {}:{}/{}",
            config.redis_host,
            config.redis_port,
            config.redis_db
        );

        let client = redis::Client::open(config.redis_url())?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        *self.client.write().await = Some(client);
        self.initialized.store(true, Ordering::Relaxed);
        tracing::info!("Redis connection initialized");
        Ok(())
    }

    /// 释放连接（应用停止时调用）
    pub async fn close(&self) {
        self.initialized.store(false, Ordering::Relaxed);
        if self.client.write().await.take().is_some() {
            tracing::info!("Redis connection closed");
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or(StoreError::Unavailable)?;
        Ok(client.get_multiplexed_async_connection().await?)
    }
}

impl Default for RedisStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(keys).await?;
        Ok(removed.max(0) as u64)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let found: Vec<String> = conn.keys(pattern).await?;
        Ok(found)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        let remaining: i64 = conn.ttl(key).await?;
        Ok(remaining)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let applied: bool = conn.expire(key, ttl_secs as i64).await?;
        Ok(applied)
    }

    async fn pipeline(&self, commands: &[StoreCommand]) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();

        for command in commands {
            match command {
                StoreCommand::ZAdd { key, score, member } => {
                    pipe.zadd(key, member, *score);
                }
                StoreCommand::ZRemRangeByScore { key, min, max } => {
                    pipe.zrembyscore(key, *min, *max);
                }
                StoreCommand::ZCard { key } => {
                    pipe.zcard(key);
                }
                StoreCommand::Expire { key, ttl_secs } => {
                    pipe.expire(key, *ttl_secs as i64);
                }
            }
        }

        let replies: Vec<i64> = pipe.query_async(&mut conn).await?;
        Ok(replies)
    }
}
