//! 订单对账 Worker
//!
//! 以固定间隔全量扫描未到终态（NEW / PROCESSING）的订单，逐单向积分计算系统
//! 查询结果并通过 `OrderService::apply_accrual` 推进状态、入账：
//! 1. 单轮内最多 `concurrency` 个订单并发查询，超出的排队
//! 2. 单个订单失败只记录日志，不影响其他订单
//! 3. 整轮受 `pass_timeout` 限制，未处理完的订单留给下一轮
//! 4. 下一轮从上一轮最后派发的订单之后开始，持续超时的订单不会饿死后面的订单
//! 5. 收到 429 时本轮提前结束，按 Retry-After 暂停后再继续
//! 6. 每轮最后补记"已 PROCESSED 但未入账"的订单，不受 `pass_timeout` 限制
//!
//! 新订单上传会通过 `Notify` 提前唤醒一轮扫描，定时扫描仍是兜底。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use loyalty_core::{
    AccrualError, AccrualOracle, CreditOutcome, LoyaltyError, Order, OrderRepositoryTrait,
    OrderService, OrderStatus, TransitionOutcome,
};
use loyalty_shared::config::ReconciliationConfig;
use loyalty_shared::observability::metrics;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

const WORKER_NAME: &str = "reconciliation_worker";

/// 429 未携带 Retry-After 时的暂停时间
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Worker 配置
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// 两轮扫描的间隔
    pub interval: Duration,
    /// 单轮截止时间
    pub pass_timeout: Duration,
    /// 单轮内并发查询的订单数上限
    pub concurrency: usize,
    /// 限流暂停的上限
    pub max_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&ReconciliationConfig::default())
    }
}

impl From<&ReconciliationConfig> for WorkerConfig {
    fn from(config: &ReconciliationConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            pass_timeout: Duration::from_secs(config.pass_timeout_seconds.max(1)),
            concurrency: config.concurrency.max(1),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// 单轮扫描汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// 本轮待对账订单数
    pub pending: usize,
    /// 标记为 PROCESSED
    pub processed: usize,
    /// 标记为 INVALID
    pub invalid: usize,
    /// 推进到 PROCESSING
    pub updated: usize,
    /// 答复与当前状态一致，或订单已被并发推进到终态
    pub unchanged: usize,
    /// 积分计算系统暂无信息（204）
    pub not_ready: usize,
    /// 查询或写入失败，下一轮重试
    pub failed: usize,
    /// 本轮新入账的订单数
    pub credited: usize,
    /// 补偿扫描补记入账的订单数
    pub recovered: usize,
    /// 被限流时积分计算系统要求的等待时间
    pub rate_limited: Option<Duration>,
    /// 本轮是否因超时提前结束
    pub timed_out: bool,
}

impl PassReport {
    fn record(&mut self, outcome: OrderOutcome) {
        let label = match outcome {
            OrderOutcome::NotReady => {
                self.not_ready += 1;
                "not_ready"
            }
            OrderOutcome::Unchanged => {
                self.unchanged += 1;
                "unchanged"
            }
            OrderOutcome::Updated(OrderStatus::Invalid) => {
                self.invalid += 1;
                "invalid"
            }
            OrderOutcome::Updated(_) => {
                self.updated += 1;
                "processing"
            }
            OrderOutcome::Processed { credited } => {
                self.processed += 1;
                if credited {
                    self.credited += 1;
                }
                "processed"
            }
            OrderOutcome::RateLimited(retry_after) => {
                self.rate_limited = Some(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF));
                "rate_limited"
            }
            OrderOutcome::Failed => {
                self.failed += 1;
                "failed"
            }
        };
        metrics::record_reconciliation_order(label);
    }
}

/// 扫描游标：上一轮最后派发查询的订单（上传时间, 订单号）
type Cursor = (DateTime<Utc>, String);

/// 单个订单的对账结果
#[derive(Debug, Clone, PartialEq)]
enum OrderOutcome {
    NotReady,
    Unchanged,
    Updated(OrderStatus),
    Processed { credited: bool },
    RateLimited(Option<Duration>),
    Failed,
}

/// 对账 Worker
pub struct ReconciliationWorker {
    orders: Arc<dyn OrderRepositoryTrait>,
    oracle: Arc<dyn AccrualOracle>,
    order_service: Arc<OrderService>,
    config: WorkerConfig,
    hint: Arc<Notify>,
    cursor: Mutex<Option<Cursor>>,
}

impl ReconciliationWorker {
    pub fn new(
        orders: Arc<dyn OrderRepositoryTrait>,
        oracle: Arc<dyn AccrualOracle>,
        order_service: Arc<OrderService>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            orders,
            oracle,
            order_service,
            config,
            hint: Arc::new(Notify::new()),
            cursor: Mutex::new(None),
        }
    }

    /// 使用外部提供的唤醒信号（与 `OrderService::with_reconcile_hint` 共享）
    pub fn with_hint(mut self, hint: Arc<Notify>) -> Self {
        self.hint = hint;
        self
    }

    /// 主循环：直到关闭信号变为 `true` 或发送端被丢弃
    ///
    /// 正在进行的一轮会完整结束后再退出。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = ?self.config.interval,
            pass_timeout = ?self.config.pass_timeout,
            concurrency = self.config.concurrency,
            "ReconciliationWorker 已启动"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        // 上一轮耗时超过间隔时，下一轮从上一轮结束时重新计时
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
                _ = self.hint.notified() => {
                    debug!("收到新订单提示，提前开始对账");
                }
            }

            let report = self.run_pass().await;
            metrics::set_worker_last_run(WORKER_NAME, Utc::now().timestamp());

            if let Some(retry_after) = report.rate_limited {
                let backoff = retry_after.min(self.config.max_backoff);
                warn!(backoff = ?backoff, "积分计算系统限流，暂停对账");

                tokio::select! {
                    biased;

                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                ticker.reset();
            }
        }

        info!("ReconciliationWorker 已停止");
    }

    /// 执行一轮对账
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> PassReport {
        let started = Instant::now();
        let mut report = PassReport::default();

        let timed_out = tokio::time::timeout(self.config.pass_timeout, self.reconcile_all(&mut report))
            .await
            .is_err();
        if timed_out {
            report.timed_out = true;
            warn!(
                pending = report.pending,
                pass_timeout = ?self.config.pass_timeout,
                "对账超时，剩余订单留给下一轮"
            );
        }

        self.recover_credits(&mut report).await;

        let elapsed = started.elapsed();
        metrics::record_reconciliation_pass(report.pending, elapsed.as_secs_f64());

        if report.pending > 0 || report.recovered > 0 || report.timed_out {
            info!(
                pending = report.pending,
                processed = report.processed,
                invalid = report.invalid,
                updated = report.updated,
                not_ready = report.not_ready,
                failed = report.failed,
                credited = report.credited,
                recovered = report.recovered,
                elapsed_ms = elapsed.as_millis() as u64,
                "对账完成"
            );
        }

        report
    }

    async fn reconcile_all(&self, report: &mut PassReport) {
        let pending = match self.orders.list_pending().await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "查询待对账订单失败");
                return;
            }
        };
        report.pending = pending.len();
        if pending.is_empty() {
            return;
        }

        let cursor = self.cursor.lock().clone();
        let pending = rotate_after(pending, cursor.as_ref());

        let mut outcomes = stream::iter(pending)
            .map(|order| {
                // 派发即推进游标，本轮超时被丢弃的查询也算已轮到
                *self.cursor.lock() = Some((order.uploaded_at, order.number.clone()));
                self.reconcile_order(order)
            })
            .buffer_unordered(self.config.concurrency);

        while let Some(outcome) = outcomes.next().await {
            let rate_limited = matches!(outcome, OrderOutcome::RateLimited(_));
            report.record(outcome);
            if rate_limited {
                // 丢弃未完成的查询，剩余订单下一轮再查
                break;
            }
        }
    }

    /// 查询并应用单个订单的结果，所有错误在这里消化
    async fn reconcile_order(&self, order: Order) -> OrderOutcome {
        let result = match self.oracle.query(&order.number).await {
            Ok(Some(result)) => result,
            Ok(None) => return OrderOutcome::NotReady,
            Err(AccrualError::RateLimited { retry_after }) => {
                return OrderOutcome::RateLimited(retry_after);
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(order = %order.number, error = %e, "查询积分计算系统失败");
                } else {
                    // 未知状态或非法金额，订单保持不变等待下一轮
                    error!(order = %order.number, kind = e.kind(), error = %e, "积分计算系统答复无效");
                }
                return OrderOutcome::Failed;
            }
        };

        match self.order_service.apply_accrual(&order, &result).await {
            Ok(TransitionOutcome::Unchanged) | Ok(TransitionOutcome::Skipped) => {
                OrderOutcome::Unchanged
            }
            Ok(TransitionOutcome::Updated(status)) => OrderOutcome::Updated(status),
            Ok(TransitionOutcome::Processed { credit, .. }) => OrderOutcome::Processed {
                credited: credit.is_applied(),
            },
            Err(e) => {
                log_apply_failure(&order, &e);
                OrderOutcome::Failed
            }
        }
    }

    /// 补记已 PROCESSED 但未入账的订单
    async fn recover_credits(&self, report: &mut PassReport) {
        let uncredited = match self.orders.list_uncredited().await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "查询未入账订单失败");
                return;
            }
        };

        for order in uncredited {
            match self.order_service.credit_processed(&order).await {
                Ok(CreditOutcome::Applied) => {
                    report.recovered += 1;
                    info!(order = %order.number, user_id = order.user_id, "补记入账完成");
                }
                Ok(CreditOutcome::AlreadyApplied) => {}
                Err(e) => {
                    error!(order = %order.number, error = %e, "补记入账失败");
                }
            }
        }
    }
}

/// 把游标之后的订单排到前面，其余的接在后面
///
/// `pending` 按（上传时间, 订单号）正序；游标已是最后一个订单时从头开始。
fn rotate_after(mut pending: Vec<Order>, cursor: Option<&Cursor>) -> Vec<Order> {
    if let Some((uploaded_at, number)) = cursor {
        let start = pending
            .iter()
            .position(|o| (o.uploaded_at, o.number.as_str()) > (*uploaded_at, number.as_str()))
            .unwrap_or(0);
        pending.rotate_left(start);
    }
    pending
}

fn log_apply_failure(order: &Order, error: &LoyaltyError) {
    if error.is_retryable() {
        warn!(order = %order.number, error = %error, "订单对账写入失败，下一轮重试");
    } else {
        error!(
            order = %order.number,
            code = error.error_code(),
            error = %error,
            "订单对账结果无法应用"
        );
    }
}
