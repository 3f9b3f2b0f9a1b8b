use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::limiter::{RateLimitConfig, RateLimitRejection, RateLimiter, client_identity};

const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// 限流中间件共享状态
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, config: RateLimitConfig) -> Self {
        RateLimitState { limiter, config }
    }
}

#[derive(Serialize)]
struct RejectionBody {
    detail: String,
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RejectionBody {
                detail: self.message,
            }),
        )
            .into_response();
        apply_headers(
            response.headers_mut(),
            self.limit,
            self.remaining,
            self.reset_secs,
        );
        response
    }
}

fn apply_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_secs: u64) {
    let pairs = [
        (HEADER_LIMIT, limit.to_string()),
        (HEADER_REMAINING, remaining.to_string()),
        (HEADER_RESET, reset_secs.to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

/// 限流中间件
///
/// 与 `axum::middleware::from_fn_with_state` 配合使用。
/// 放行与拒绝的响应都带 X-RateLimit-* 头，拒绝为 429。
pub async fn rate_limit(
    State(state): State<Arc<RateLimitState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // 从连接信息获取原始IP
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok());
    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let identity = client_identity(forwarded, remote_ip.as_deref(), user_agent);
    let decision = state.limiter.check(&identity, &state.config).await;

    if decision.limited {
        tracing::debug!("请求超限: identity={}", identity);
        return RateLimitRejection::from_decision(&decision).into_response();
    }

    let mut response = next.run(req).await;
    apply_headers(
        response.headers_mut(),
        decision.limit,
        decision.remaining,
        decision.reset_secs,
    );
    response
}
