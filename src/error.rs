use thiserror::Error;

/// 存储层错误分类
///
/// 基础设施故障不会传播给被保护操作的调用方：限流器 fail-open，
/// 缓存按未命中处理，失效操作仅记录日志。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 存储尚未初始化或已关闭
    #[error("存储未初始化")]
    Unavailable,

    /// 单次存储调用失败（超时、协议错误等）
    #[error("存储操作失败: {0}")]
    Operation(#[from] redis::RedisError),

    /// 缓存值无法编码
    #[error("序列化失败: {0}")]
    Serialization(String),
}
