//! 积分服务
//!
//! 提供订单上传、余额与积分抵扣 REST API，并在后台对账订单积分。

use std::sync::Arc;

use loyalty_core::{
    BalanceLedgerTrait, HttpAccrualClient, OrderRepositoryTrait, OrderService, PgBalanceLedger,
    PgOrderRepository, WithdrawalService,
};
use loyalty_server::{
    auth::{JwtConfig, JwtManager},
    routes,
    state::AppState,
    worker::{ReconciliationWorker, WorkerConfig},
};
use loyalty_shared::{config::AppConfig, database::Database, observability};
use tokio::net::TcpListener;
use tokio::sync::{Notify, watch};
use tracing::{info, warn};

const SERVICE_NAME: &str = "loyalty-server";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.observability, &config.service_name).await?;

    info!("Starting {} on {}", config.service_name, config.server_addr());

    if config.auth.jwt_secret == loyalty_shared::config::AuthConfig::default().jwt_secret {
        if config.is_production() {
            anyhow::bail!("生产环境必须通过 LOYALTY_AUTH__JWT_SECRET 设置 JWT 密钥");
        }
        warn!("Using default JWT secret - set LOYALTY_AUTH__JWT_SECRET for production");
    }

    // 初始化基础设施
    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    let orders: Arc<dyn OrderRepositoryTrait> = Arc::new(PgOrderRepository::new(db.pool().clone()));
    let ledger: Arc<dyn BalanceLedgerTrait> = Arc::new(PgBalanceLedger::new(db.pool().clone()));
    let oracle = Arc::new(HttpAccrualClient::from_config(&config.accrual)?);
    info!(base_url = %oracle.base_url(), "Accrual client initialized");

    // 新订单上传后提前唤醒对账
    let reconcile_hint = Arc::new(Notify::new());
    let order_service = Arc::new(
        OrderService::new(orders.clone(), ledger.clone()).with_reconcile_hint(reconcile_hint.clone()),
    );
    let withdrawal_service = Arc::new(WithdrawalService::new(ledger));
    let jwt_manager = Arc::new(JwtManager::new(JwtConfig::from(&config.auth)));

    // 启动对账 Worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = ReconciliationWorker::new(
        orders,
        oracle,
        order_service.clone(),
        WorkerConfig::from(&config.reconciliation),
    )
    .with_hint(reconcile_hint);
    let worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let state = AppState::new(order_service, withdrawal_service, jwt_manager).with_database(db.clone());
    let app = routes::app(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 通知 worker 结束当前一轮后退出
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "ReconciliationWorker 异常退出");
    }

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
