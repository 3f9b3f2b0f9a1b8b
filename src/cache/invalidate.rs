use std::future::Future;
use std::sync::Arc;

use crate::store::KeyValueStore;

/// 缓存失效协调器
///
/// 写操作成功提交后按 glob 模式批量删除缓存键。删除失败只会
/// 退化为一段时间的陈旧读，从不让写操作的调用方看到错误。
pub struct CacheInvalidator {
    store: Arc<dyn KeyValueStore>,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        CacheInvalidator { store }
    }

    /// 删除匹配模式的所有缓存键，返回删除数量
    ///
    /// 无匹配返回 0；存储故障记录日志后返回 0。
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        if !self.store.is_initialized() {
            tracing::warn!("存储未初始化，跳过缓存失效: {}", pattern);
            return 0;
        }

        let keys = match self.store.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("枚举缓存键失败: {}", e);
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }

        match self.store.delete_keys(&keys).await {
            Ok(removed) => {
                tracing::debug!("已失效 {} 个缓存键，模式: {}", removed, pattern);
                removed
            }
            Err(e) => {
                tracing::error!("按模式删除缓存失败: {}", e);
                0
            }
        }
    }

    /// 执行写操作，成功后依次应用各失效模式
    ///
    /// 写操作失败时原样返回错误且不触碰缓存，
    /// 失败的写不应驱逐仍然有效的缓存状态。
    pub async fn invalidate_after<F, Fut, T, E>(&self, patterns: &[&str], op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let result = op().await?;
        for pattern in patterns {
            self.invalidate(pattern).await;
        }
        Ok(result)
    }
}
