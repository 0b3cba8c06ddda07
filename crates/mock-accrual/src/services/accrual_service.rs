//! Mock 积分计算服务
//!
//! 复现真实积分计算系统的 REST 接口：
//! - `GET /api/orders/{number}`：200 返回计算结果，204 表示暂无信息，429 表示限流
//! - `PUT /api/orders/{number}`：预设某个订单的答复（测试与联调用）

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::get,
};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::models::MockAccrual;
use crate::store::MemoryStore;

/// 未预设订单的答复方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// 首次查询登记为 REGISTERED，之后每次查询推进一步，最终随机落到 PROCESSED / INVALID
    Random,
    /// 只返回预设答复，未预设的订单一律 204
    Scripted,
}

/// 固定窗口限流器
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<(Instant, u32)>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new((Instant::now(), 0)),
        }
    }

    /// 每分钟最多 `limit` 次
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// 放行返回 None，限流时返回距窗口结束的秒数
    pub fn check(&self) -> Option<u64> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.0);
        if elapsed >= self.window {
            *state = (now, 0);
        }
        if state.1 >= self.limit {
            let remaining = self.window.saturating_sub(now.duration_since(state.0));
            return Some(remaining.as_secs().max(1));
        }
        state.1 += 1;
        None
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// 积分计算服务状态
pub struct AccrualServiceState {
    pub accruals: MemoryStore<MockAccrual>,
    pub mode: Mode,
    pub limiter: Option<RateLimiter>,
}

impl AccrualServiceState {
    pub fn new(mode: Mode) -> Self {
        Self {
            accruals: MemoryStore::new(),
            mode,
            limiter: None,
        }
    }

    pub fn with_rate_limit(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// 预设答复
    pub fn script(&self, accrual: MockAccrual) {
        let key = accrual.order.clone();
        self.accruals.insert(&key, accrual);
    }
}

// ============================================================================
// 路由定义
// ============================================================================

pub fn accrual_routes() -> Router<Arc<AccrualServiceState>> {
    Router::new().route("/api/orders/{number}", get(get_accrual).put(put_accrual))
}

// ============================================================================
// 路由处理器
// ============================================================================

/// 查询订单计算结果
///
/// GET /api/orders/{number}
async fn get_accrual(
    State(state): State<Arc<AccrualServiceState>>,
    Path(number): Path<String>,
) -> Response {
    if let Some(limiter) = &state.limiter {
        if let Some(retry_after) = limiter.check() {
            warn!(number = %number, retry_after, "请求过于频繁");
            let mut headers = HeaderMap::new();
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
            return (
                StatusCode::TOO_MANY_REQUESTS,
                headers,
                format!("No more than {} requests per minute allowed", limiter.limit()),
            )
                .into_response();
        }
    }

    let reply = match state.mode {
        Mode::Scripted => state.accruals.get(&number),
        Mode::Random => {
            // 首次查询只登记，后续每次查询推进一步
            let fresh = Cell::new(false);
            Some(state.accruals.upsert_with(
                &number,
                || {
                    fresh.set(true);
                    MockAccrual::registered(number.clone())
                },
                |accrual| {
                    if !fresh.get() {
                        accrual.advance(&mut rand::rng());
                    }
                },
            ))
        }
    };

    match reply {
        Some(accrual) => {
            debug!(number = %number, status = ?accrual.status, "返回计算结果");
            Json(accrual).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// 预设订单计算结果
///
/// PUT /api/orders/{number}
async fn put_accrual(
    State(state): State<Arc<AccrualServiceState>>,
    Path(number): Path<String>,
    Json(mut accrual): Json<MockAccrual>,
) -> StatusCode {
    info!(number = %number, status = ?accrual.status, accrual = ?accrual.accrual, "预设计算结果");
    accrual.order = number;
    state.script(accrual);
    StatusCode::NO_CONTENT
}

// ============================================================================
// 单元测试
// ============================================================================
