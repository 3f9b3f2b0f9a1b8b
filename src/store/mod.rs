// 存储模块
// KeyValueStore 抽象及其 Redis / 内存两种实现

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// 管道命令
///
/// 限流器滑动窗口所需的封闭命令集，按序提交、按序应答。
/// 四条命令的应答都是整数，因此管道结果统一为 `Vec<i64>`。
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    /// 向有序集合写入一个成员
    ZAdd {
        key: String,
        score: f64,
        member: String,
    },
    /// 按分数区间删除成员（闭区间）
    ZRemRangeByScore { key: String, min: f64, max: f64 },
    /// 读取有序集合基数
    ZCard { key: String },
    /// 刷新键的过期时间
    Expire { key: String, ttl_secs: u64 },
}

/// 共享键值存储的异步接口
///
/// 所有协调逻辑都通过存储自身的原子原语表达，组件之间不持有额外互斥锁。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 存储是否已完成初始化；未初始化时上层组件一律 fail-open
    fn is_initialized(&self) -> bool;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 带过期时间写入
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// 批量删除，返回删除数量
    async fn delete_keys(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// 枚举匹配 glob 模式的键
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// 剩余生存时间：-1 表示无过期，-2 表示键不存在
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// 原子执行一组命令，命令之间不会被其他客户端插入
    async fn pipeline(&self, commands: &[StoreCommand]) -> Result<Vec<i64>, StoreError>;
}
