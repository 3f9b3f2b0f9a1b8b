use std::future::Future;
use std::sync::Arc;

use crate::store::KeyValueStore;

use super::keys::{RequestParams, request_cache_key};
use super::serialize::{CacheValue, deserialize, serialize};

/// 单个受保护读操作的缓存策略
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// 操作标识，同时作为缓存键前缀
    pub prefix: String,
    /// 过期时间，None 时使用全局默认值
    pub ttl_secs: Option<u64>,
    pub include_path_params: bool,
    pub include_query_params: bool,
}

impl CachePolicy {
    pub fn new(prefix: &str) -> Self {
        CachePolicy {
            prefix: prefix.to_string(),
            ttl_secs: None,
            include_path_params: true,
            include_query_params: true,
        }
    }

    pub fn ttl(mut self, secs: u64) -> Self {
        self.ttl_secs = Some(secs);
        self
    }
}

/// Cache-aside 协调器
///
/// 包装无副作用的读操作：命中直接返回，未命中计算后回填。
/// 缓存只是优化层，任何存储故障都退回到直接计算，
/// 读操作的正确性从不依赖缓存可用。
pub struct CacheAside {
    store: Arc<dyn KeyValueStore>,
    default_ttl_secs: u64,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KeyValueStore>, default_ttl_secs: u64) -> Self {
        CacheAside {
            store,
            default_ttl_secs,
        }
    }

    /// 执行受保护的读操作
    ///
    /// `compute` 的错误原样向上传播且不会回填缓存；
    /// 存储的读错误按未命中处理，写错误仅记录日志。
    pub async fn execute<F, Fut, E>(
        &self,
        policy: &CachePolicy,
        params: &RequestParams,
        compute: F,
    ) -> Result<CacheValue, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue, E>>,
    {
        // 存储未初始化时跳过缓存，直接计算
        if !self.store.is_initialized() {
            return compute().await;
        }

        let key = request_cache_key(
            &policy.prefix,
            params,
            policy.include_path_params,
            policy.include_query_params,
        );

        match self.store.get(&key).await {
            Ok(Some(raw)) => {
                tracing::debug!("缓存命中: {}", key);
                return Ok(deserialize(&raw));
            }
            Ok(None) => {
                tracing::debug!("缓存未命中: {}", key);
            }
            Err(e) => {
                tracing::error!("读取缓存失败，按未命中处理: {}", e);
            }
        }

        let result = compute().await?;

        let ttl_secs = policy.ttl_secs.unwrap_or(self.default_ttl_secs);
        match serialize(&result) {
            Ok(encoded) => {
                if let Err(e) = self.store.set(&key, &encoded, ttl_secs).await {
                    tracing::error!("写入缓存失败: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("序列化失败，放弃本次缓存写入: {}", e);
            }
        }

        Ok(result)
    }
}
