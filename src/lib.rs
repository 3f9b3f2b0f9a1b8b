// 流量防护层
// 滑动窗口限流 + cache-aside 缓存协调，共用一条 Redis 连接

use std::sync::Arc;

pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod middleware;
pub mod store;

use cache::{CacheAside, CacheInvalidator};
use config::Config;
use error::StoreError;
use limiter::RateLimiter;
use store::{KeyValueStore, RedisStore};

/// 进程级共享状态
///
/// 各组件显式构造、共享所有权注入，生命周期由
/// `initialize` / `close` 显式管理。
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<RedisStore>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<CacheAside>,
    pub invalidator: Arc<CacheInvalidator>,
}

impl AppState {
    /// 组装各组件但不建立连接
    ///
    /// 存储保持未初始化，所有组件按 fail-open 运行；
    /// 可稍后调用 `store.initialize` 接入。
    pub fn detached(config: Config) -> Self {
        let store = Arc::new(RedisStore::new());
        let kv: Arc<dyn KeyValueStore> = store.clone();
        let limiter = Arc::new(RateLimiter::new(kv.clone()));
        let cache = Arc::new(CacheAside::new(kv.clone(), config.cache_ttl_secs));
        let invalidator = Arc::new(CacheInvalidator::new(kv));
        AppState {
            config,
            store,
            limiter,
            cache,
            invalidator,
        }
    }

    /// 组装各组件并建立存储连接（应用启动时调用）
    pub async fn initialize(config: Config) -> Result<Self, StoreError> {
        let state = Self::detached(config);
        state.store.initialize(&state.config).await?;
        Ok(state)
    }

    /// 释放存储连接（应用停止时调用）
    pub async fn close(&self) {
        self.store.close().await;
    }
}
