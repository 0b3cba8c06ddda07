//! Mock Accrual 入口

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use mock_accrual::cli::Cli;
use mock_accrual::services::{AccrualServiceState, RateLimiter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 优先使用环境变量 RUST_LOG，否则使用命令行参数指定的级别
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .init();

    let mut state = AccrualServiceState::new(cli.mode);
    if let Some(limit) = cli.rate_limit {
        state = state.with_rate_limit(RateLimiter::per_minute(limit));
    }
    let app = mock_accrual::app(Arc::new(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr).await.context("绑定端口失败")?;

    info!(mode = ?cli.mode, rate_limit = ?cli.rate_limit, "Mock Accrual 已启动: http://{}", addr);
    info!("  GET /api/orders/{{number}} - 查询计算结果");
    info!("  PUT /api/orders/{{number}} - 预设计算结果");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务器运行失败")?;

    info!("Mock Accrual 已停止");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
