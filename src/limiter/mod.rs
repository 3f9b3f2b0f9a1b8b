// 限流模块
// 基于共享存储有序集合的滑动窗口日志算法

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use md5::{Digest, Md5};

use crate::config::Config;
use crate::store::{KeyValueStore, StoreCommand};

/// 单个受保护操作的限流配置
///
/// `requests` 与 `window_secs` 必须为正。构造后不可变，
/// 每个受保护操作持有一份（或取进程级默认值）。
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_secs: u64,
    pub prefix: String,
}

impl RateLimitConfig {
    pub fn new(requests: u32, window_secs: u64) -> Self {
        RateLimitConfig {
            requests,
            window_secs,
            prefix: "ratelimit".to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// 取进程级默认配额
    pub fn from_app_config(config: &Config) -> Self {
        Self::new(config.rate_limit_requests, config.rate_limit_window_secs)
    }
}

/// 一次准入判定的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
    /// 距窗口重置的秒数，按墙钟窗口取模估算；
    /// 不等于下一个可用名额的等待时间，仅作退避提示
    pub reset_secs: u64,
}

/// 限流拒绝信号
///
/// 这是本层唯一向调用方抛出的控制流结果，由路由层渲染为
/// 429 响应及 X-RateLimit-* 头。
#[derive(Debug, Clone)]
pub struct RateLimitRejection {
    pub message: String,
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

impl RateLimitRejection {
    pub fn from_decision(decision: &RateLimitDecision) -> Self {
        RateLimitRejection {
            message: "Rate limit exceeded".to_string(),
            limit: decision.limit,
            remaining: decision.remaining,
            reset_secs: decision.reset_secs,
        }
    }
}

/// 分布式滑动窗口限流器
///
/// 除共享存储外没有中心协调者：单次判定的
/// 写入-剪枝-计数-续期以一个原子批次提交，
/// 不同客户端的批次之间不保证顺序。
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
}

/// 窗口成员的进程内序号；同一微秒的两次请求必须各占一个成员，
/// 否则剪枝后的基数会少计窗口内的请求数
static WINDOW_SEQ: AtomicU64 = AtomicU64::new(0);

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        RateLimiter { store }
    }

    /// 记录本次请求并判定是否超限
    ///
    /// 先写后剪枝：窗口边界上的并发突发最多各多放行一个条目，
    /// 以此换掉第二次往返。存储不可用或调用失败时 fail-open，
    /// 返回满额度放行，限流不能成为被保护操作的单点故障。
    pub async fn check(&self, identity: &str, config: &RateLimitConfig) -> RateLimitDecision {
        if !self.store.is_initialized() {
            return Self::fail_open(config);
        }

        let now = chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        let window_key = format!("{}:{}", config.prefix, identity);
        let window_start = now - config.window_secs as f64;

        let commands = [
            StoreCommand::ZAdd {
                key: window_key.clone(),
                score: now,
                member: format!("{}-{}", now, WINDOW_SEQ.fetch_add(1, Ordering::Relaxed)),
            },
            StoreCommand::ZRemRangeByScore {
                key: window_key.clone(),
                min: 0.0,
                max: window_start,
            },
            StoreCommand::ZCard {
                key: window_key.clone(),
            },
            StoreCommand::Expire {
                key: window_key,
                ttl_secs: config.window_secs,
            },
        ];

        match self.store.pipeline(&commands).await {
            Ok(replies) => {
                let count = replies.get(2).copied().unwrap_or(0).max(0) as u64;
                let remaining = u64::from(config.requests).saturating_sub(count) as u32;
                let reset_secs =
                    (config.window_secs as f64 - (now % config.window_secs as f64)) as u64;
                RateLimitDecision {
                    limited: count > u64::from(config.requests),
                    limit: config.requests,
                    remaining,
                    reset_secs,
                }
            }
            Err(e) => {
                tracing::error!("限流检查失败，放行请求: {}", e);
                Self::fail_open(config)
            }
        }
    }

    fn fail_open(config: &RateLimitConfig) -> RateLimitDecision {
        RateLimitDecision {
            limited: false,
            limit: config.requests,
            remaining: config.requests,
            reset_secs: config.window_secs,
        }
    }
}

/// 派生客户端逻辑身份
///
/// 取转发头的第一个非空地址，否则用传输层地址，再否则记 unknown；
/// 与 agent 串拼接后取 md5，保证键长度有界且不外泄原始地址。
pub fn client_identity(
    forwarded_for: Option<&str>,
    remote_addr: Option<&str>,
    user_agent: &str,
) -> String {
    let ip = forwarded_for
        .and_then(|header| {
            header
                .split(',')
                .map(str::trim)
                .find(|part| !part.is_empty())
        })
        .or(remote_addr)
        .unwrap_or("unknown");

    let identifier = format!("{}:{}", ip, user_agent);
    format!("{:x}", Md5::digest(identifier.as_bytes()))
}
