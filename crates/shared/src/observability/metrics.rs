//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    pub fn shutdown(self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig, service_name: &str) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // 保存到全局，供其他地方获取指标快照
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册通用指标描述，会出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "order_submissions_total",
        "Order number submissions by outcome"
    );
    metrics::describe_counter!("withdrawals_total", "Withdrawal requests by outcome");

    metrics::describe_counter!(
        "reconciliation_orders_total",
        "Orders handled by the reconciliation worker, by outcome"
    );
    metrics::describe_histogram!(
        "reconciliation_pass_duration_seconds",
        "Reconciliation pass duration in seconds"
    );
    metrics::describe_gauge!(
        "reconciliation_pending_orders",
        "Non-terminal orders seen by the last reconciliation pass"
    );
    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the last completed worker pass"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录订单号提交结果（accepted / already_uploaded / conflict / invalid）
#[inline]
pub fn record_order_submission(outcome: &str) {
    metrics::counter!("order_submissions_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录提现结果（success / insufficient_funds / invalid / duplicate / error）
#[inline]
pub fn record_withdrawal(outcome: &str) {
    metrics::counter!("withdrawals_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录对账中单个订单的处理结果
#[inline]
pub fn record_reconciliation_order(outcome: &str) {
    metrics::counter!(
        "reconciliation_orders_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一轮对账扫描
#[inline]
pub fn record_reconciliation_pass(pending: usize, duration_secs: f64) {
    metrics::gauge!("reconciliation_pending_orders").set(pending as f64);
    metrics::histogram!("reconciliation_pass_duration_seconds").record(duration_secs);
}

/// 更新 worker 最近一次运行时间
#[inline]
pub fn set_worker_last_run(worker: &str, timestamp_secs: i64) {
    metrics::gauge!("worker_last_run_timestamp", "worker" => worker.to_string())
        .set(timestamp_secs as f64);
}
