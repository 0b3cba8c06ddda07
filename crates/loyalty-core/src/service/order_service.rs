//! 订单生命周期服务
//!
//! 负责订单上传准入，以及根据积分计算系统的答复推进订单状态：
//! - 订单号格式与 Luhn 校验
//! - 归属检查（本人重复上传 / 他人已上传）
//! - 以数据库主键作为唯一性的最终裁决，插入冲突时重新读取归属
//! - 状态迁移校验与条件更新，终态订单永不被覆盖
//! - PROCESSED 时先写订单、再按订单号幂等入账

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use crate::accrual::{AccrualError, AccrualResult};
use crate::error::{LoyaltyError, Result};
use crate::models::{CreditOutcome, Order, OrderStatus, StatusUpdate};
use crate::repository::{BalanceLedgerTrait, OrderRepositoryTrait};
use crate::validation::validate_order_number;

/// 对账结果应用到订单后的结果
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// 状态与当前一致，无需写入
    Unchanged,
    /// 订单已处于终态（或被并发写入推进到终态），跳过
    Skipped,
    /// 状态已更新，不涉及余额
    Updated(OrderStatus),
    /// 已标记 PROCESSED 并入账
    Processed {
        accrual: Decimal,
        credit: CreditOutcome,
    },
}

/// 订单生命周期服务
pub struct OrderService {
    orders: Arc<dyn OrderRepositoryTrait>,
    ledger: Arc<dyn BalanceLedgerTrait>,
    /// 新订单上传后唤醒对账 worker，只用于缩短延迟
    reconcile_hint: Option<Arc<Notify>>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepositoryTrait>, ledger: Arc<dyn BalanceLedgerTrait>) -> Self {
        Self {
            orders,
            ledger,
            reconcile_hint: None,
        }
    }

    pub fn with_reconcile_hint(mut self, hint: Arc<Notify>) -> Self {
        self.reconcile_hint = Some(hint);
        self
    }

    /// 上传订单
    ///
    /// 本人重复上传返回 `OrderAlreadyExists`（调用方视为幂等成功），
    /// 他人已上传返回 `OrderOwnedByOther`。
    #[instrument(skip(self, raw_number))]
    pub async fn admit(&self, user_id: i64, raw_number: &str) -> Result<Order> {
        let number = validate_order_number(raw_number)?;

        if let Some(owner) = self.orders.find_owner(&number).await? {
            return Err(ownership_conflict(number, owner, user_id));
        }

        let order = Order::new(number, user_id);
        if !self.orders.insert_new(&order).await? {
            // 检查与插入之间被并发上传抢先，以数据库中的归属为准
            let owner = self.orders.find_owner(&order.number).await?.ok_or_else(|| {
                LoyaltyError::Internal(format!("订单插入冲突但未找到归属: {}", order.number))
            })?;
            return Err(ownership_conflict(order.number, owner, user_id));
        }

        info!(order = %order.number, "订单已上传");

        if let Some(hint) = &self.reconcile_hint {
            hint.notify_one();
        }

        Ok(order)
    }

    /// 用户的订单，按上传时间倒序
    pub async fn list(&self, user_id: i64) -> Result<Vec<Order>> {
        self.orders.list_by_user(user_id).await
    }

    /// 将积分计算系统的答复应用到订单
    ///
    /// 订单状态只通过这里变更。PROCESSED 先写订单再入账，入账失败时订单保持
    /// PROCESSED，由对账的补偿扫描重新入账。
    #[instrument(skip(self, order, result), fields(order = %order.number, from = %order.status))]
    pub async fn apply_accrual(
        &self,
        order: &Order,
        result: &AccrualResult,
    ) -> Result<TransitionOutcome> {
        if order.status.is_terminal() {
            return Ok(TransitionOutcome::Skipped);
        }

        if !result.order.is_empty() && result.order != order.number {
            return Err(AccrualError::Decode(format!(
                "答复订单号不匹配: 期望 {}, 实际 {}",
                order.number, result.order
            ))
            .into());
        }

        let target = result.status.order_status();
        if target == order.status {
            return Ok(TransitionOutcome::Unchanged);
        }

        if !order.status.can_transition_to(target) {
            return Err(LoyaltyError::IllegalTransition {
                number: order.number.clone(),
                from: order.status,
                to: target,
            });
        }

        let accrual = match target {
            OrderStatus::Processed => Some(result.accrual.ok_or_else(|| {
                AccrualError::InvalidAccrual {
                    order: order.number.clone(),
                    reason: "PROCESSED 缺少 accrual".to_string(),
                }
            })?),
            _ => None,
        };

        let updated = self
            .orders
            .update_status(&StatusUpdate {
                number: order.number.clone(),
                status: target,
                accrual,
            })
            .await?;

        if !updated {
            debug!("订单已处于终态，跳过");
            return Ok(TransitionOutcome::Skipped);
        }

        match accrual {
            Some(amount) => {
                let credit = self
                    .ledger
                    .credit(order.user_id, &order.number, amount)
                    .await?;
                info!(to = %target, accrual = %amount, ?credit, "订单计算完成并入账");
                Ok(TransitionOutcome::Processed {
                    accrual: amount,
                    credit,
                })
            }
            None => {
                info!(to = %target, "订单状态已更新");
                Ok(TransitionOutcome::Updated(target))
            }
        }
    }

    /// 为已 PROCESSED 的订单补记入账
    ///
    /// 用于修复"订单已写入、入账未完成"的情况，重复调用是安全的。
    #[instrument(skip(self, order), fields(order = %order.number))]
    pub async fn credit_processed(&self, order: &Order) -> Result<CreditOutcome> {
        let amount = match (order.status, order.accrual) {
            (OrderStatus::Processed, Some(amount)) => amount,
            _ => {
                warn!(status = %order.status, "订单不是带积分的 PROCESSED 状态，无法补记入账");
                return Err(LoyaltyError::Internal(format!(
                    "订单 {} 无法补记入账: status={}",
                    order.number, order.status
                )));
            }
        };

        self.ledger
            .credit(order.user_id, &order.number, amount)
            .await
    }
}

fn ownership_conflict(number: String, owner: i64, user_id: i64) -> LoyaltyError {
    if owner == user_id {
        LoyaltyError::OrderAlreadyExists(number)
    } else {
        LoyaltyError::OrderOwnedByOther(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccrualStatus;
    use crate::repository::{MockBalanceLedgerTrait, MockOrderRepositoryTrait};

    const NUMBER: &str = "79927398713";

    fn service(orders: MockOrderRepositoryTrait, ledger: MockBalanceLedgerTrait) -> OrderService {
        OrderService::new(Arc::new(orders), Arc::new(ledger))
    }

    fn order_with(status: OrderStatus) -> Order {
        let mut order = Order::new(NUMBER, 1);
        order.status = status;
        order
    }

    #[tokio::test]
    async fn test_admit_new_order() {
        let mut orders = MockOrderRepositoryTrait::new();
        orders
            .expect_find_owner()
            .withf(|n| n == NUMBER)
            .times(1)
            .returning(|_| Ok(None));
        orders
            .expect_insert_new()
            .withf(|o| o.number == NUMBER && o.user_id == 1 && o.status == OrderStatus::New)
            .times(1)
            .returning(|_| Ok(true));

        let hint = Arc::new(Notify::new());
        let svc = service(orders, MockBalanceLedgerTrait::new()).with_reconcile_hint(hint.clone());

        let order = svc.admit(1, NUMBER).await.unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert!(order.accrual.is_none());

        // notify_one 会保存一个许可，等待方立即返回
        tokio::time::timeout(std::time::Duration::from_millis(100), hint.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_admit_invalid_number() {
        let svc = service(MockOrderRepositoryTrait::new(), MockBalanceLedgerTrait::new());

        let err = svc.admit(1, "1234567890").await.unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidOrderNumber(_)));

        let err = svc.admit(1, "7992739871a").await.unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidOrderNumber(_)));
    }

    #[tokio::test]
    async fn test_admit_existing_order() {
        let mut orders = MockOrderRepositoryTrait::new();
        orders.expect_find_owner().returning(|_| Ok(Some(1)));
        orders.expect_insert_new().never();
        let svc = service(orders, MockBalanceLedgerTrait::new());

        let err = svc.admit(1, NUMBER).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::OrderAlreadyExists(_)));

        let err = svc.admit(2, NUMBER).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::OrderOwnedByOther(_)));
    }

    #[tokio::test]
    async fn test_admit_insert_race_rereads_owner() {
        let mut orders = MockOrderRepositoryTrait::new();
        let mut seq = mockall::Sequence::new();
        orders
            .expect_find_owner()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        orders
            .expect_insert_new()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        orders
            .expect_find_owner()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(2)));

        let svc = service(orders, MockBalanceLedgerTrait::new());
        let err = svc.admit(1, NUMBER).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::OrderOwnedByOther(_)));
    }

    #[tokio::test]
    async fn test_apply_processed_writes_order_then_credits() {
        let mut orders = MockOrderRepositoryTrait::new();
        let mut ledger = MockBalanceLedgerTrait::new();
        let mut seq = mockall::Sequence::new();

        orders
            .expect_update_status()
            .withf(|u| {
                u.number == NUMBER
                    && u.status == OrderStatus::Processed
                    && u.accrual == Some(Decimal::new(500, 0))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        ledger
            .expect_credit()
            .withf(|user, n, amount| *user == 1 && n == NUMBER && *amount == Decimal::new(500, 0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(CreditOutcome::Applied));

        let svc = service(orders, ledger);
        let outcome = svc
            .apply_accrual(
                &order_with(OrderStatus::New),
                &AccrualResult::processed(NUMBER, Decimal::new(500, 0)),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Processed {
                accrual: Decimal::new(500, 0),
                credit: CreditOutcome::Applied,
            }
        );
    }

    #[tokio::test]
    async fn test_apply_registered_maps_to_processing() {
        let mut orders = MockOrderRepositoryTrait::new();
        orders
            .expect_update_status()
            .withf(|u| u.status == OrderStatus::Processing && u.accrual.is_none())
            .times(1)
            .returning(|_| Ok(true));
        let mut ledger = MockBalanceLedgerTrait::new();
        ledger.expect_credit().never();

        let svc = service(orders, ledger);
        let outcome = svc
            .apply_accrual(
                &order_with(OrderStatus::New),
                &AccrualResult::with_status(NUMBER, AccrualStatus::Registered),
            )
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Updated(OrderStatus::Processing));
    }

    #[tokio::test]
    async fn test_apply_same_status_is_noop() {
        let mut orders = MockOrderRepositoryTrait::new();
        orders.expect_update_status().never();
        let svc = service(orders, MockBalanceLedgerTrait::new());

        let outcome = svc
            .apply_accrual(
                &order_with(OrderStatus::Processing),
                &AccrualResult::with_status(NUMBER, AccrualStatus::Registered),
            )
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_apply_terminal_order_skipped() {
        let mut orders = MockOrderRepositoryTrait::new();
        orders.expect_update_status().never();
        let svc = service(orders, MockBalanceLedgerTrait::new());

        for status in [OrderStatus::Processed, OrderStatus::Invalid] {
            let outcome = svc
                .apply_accrual(
                    &order_with(status),
                    &AccrualResult::with_status(NUMBER, AccrualStatus::Processing),
                )
                .await
                .unwrap();
            assert_eq!(outcome, TransitionOutcome::Skipped);
        }
    }

    #[tokio::test]
    async fn test_apply_stale_copy_does_not_credit() {
        // 内存中的订单仍是 PROCESSING，但数据库中已是终态
        let mut orders = MockOrderRepositoryTrait::new();
        orders.expect_update_status().times(1).returning(|_| Ok(false));
        let mut ledger = MockBalanceLedgerTrait::new();
        ledger.expect_credit().never();

        let svc = service(orders, ledger);
        let outcome = svc
            .apply_accrual(
                &order_with(OrderStatus::Processing),
                &AccrualResult::processed(NUMBER, Decimal::new(10, 0)),
            )
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_apply_processed_without_accrual_rejected() {
        let mut orders = MockOrderRepositoryTrait::new();
        orders.expect_update_status().never();
        let svc = service(orders, MockBalanceLedgerTrait::new());

        let result = AccrualResult::with_status(NUMBER, AccrualStatus::Processed);
        let err = svc
            .apply_accrual(&order_with(OrderStatus::New), &result)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::Accrual(AccrualError::InvalidAccrual { .. })
        ));
    }

    #[tokio::test]
    async fn test_credit_processed() {
        let mut ledger = MockBalanceLedgerTrait::new();
        ledger
            .expect_credit()
            .times(1)
            .returning(|_, _, _| Ok(CreditOutcome::AlreadyApplied));
        let svc = service(MockOrderRepositoryTrait::new(), ledger);

        let mut order = order_with(OrderStatus::Processed);
        order.accrual = Some(Decimal::new(42, 0));
        assert_eq!(
            svc.credit_processed(&order).await.unwrap(),
            CreditOutcome::AlreadyApplied
        );

        assert!(
            svc.credit_processed(&order_with(OrderStatus::Invalid))
                .await
                .is_err()
        );
    }
}
