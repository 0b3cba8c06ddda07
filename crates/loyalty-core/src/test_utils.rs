//! 测试工具模块
//!
//! 提供内存版订单仓储与余额账本、脚本化的积分计算系统，以及生成合法订单号的辅助函数。
//! 供本 crate 与 `loyalty-server` 的测试使用，不依赖数据库。

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::accrual::{AccrualError, AccrualOracle, AccrualResult};
use crate::error::{LoyaltyError, Result};
use crate::models::{
    AccrualStatus, Balance, CreditOutcome, Order, OrderStatus, StatusUpdate, Withdrawal,
};
use crate::repository::{BalanceLedgerTrait, OrderRepositoryTrait};

// ==================== 订单号 ====================

/// 计算 Luhn 校验位
pub fn luhn_check_digit(payload: &str) -> u32 {
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            // 追加校验位后，payload 的最后一位处于“需要翻倍”的位置
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

/// 由任意数字前缀生成合法订单号
pub fn valid_order_number(payload: u64) -> String {
    let payload = payload.to_string();
    let check = luhn_check_digit(&payload);
    format!("{payload}{check}")
}

/// 生成进程内唯一的合法订单号
pub fn unique_order_number() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let base = Utc::now().timestamp_micros() as u64 % 1_000_000_000_000;
    valid_order_number(base * 1000 + COUNTER.fetch_add(1, Ordering::SeqCst) % 1000)
}

// ==================== 内存存储 ====================

#[derive(Default)]
struct StoreState {
    orders: BTreeMap<String, Order>,
    balances: HashMap<i64, Balance>,
    credits: HashSet<String>,
    withdrawals: Vec<Withdrawal>,
    next_withdrawal_id: i64,
    failing_updates: HashSet<String>,
    failing_credits: usize,
}

/// 内存版订单仓储 + 余额账本
///
/// 同一把锁保护订单与余额，语义与 PostgreSQL 实现一致：
/// 订单号唯一、终态订单不可覆盖、入账按订单号幂等、扣减原子。
/// 可以注入写入失败来模拟存储故障。
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入订单（用于准备任意状态的测试数据）
    pub fn seed_order(&self, order: Order) {
        self.state.lock().orders.insert(order.number.clone(), order);
    }

    /// 直接设置余额
    pub fn seed_balance(&self, user_id: i64, current: Decimal) {
        self.state.lock().balances.insert(
            user_id,
            Balance {
                user_id,
                current,
                withdrawn: Decimal::ZERO,
            },
        );
    }

    pub fn order(&self, number: &str) -> Option<Order> {
        self.state.lock().orders.get(number).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().orders.len()
    }

    pub fn is_credited(&self, number: &str) -> bool {
        self.state.lock().credits.contains(number)
    }

    pub fn withdrawal_count(&self) -> usize {
        self.state.lock().withdrawals.len()
    }

    /// 该订单的状态更新始终失败
    pub fn fail_updates_for(&self, number: &str) {
        self.state.lock().failing_updates.insert(number.to_string());
    }

    /// 接下来 `n` 次入账失败
    pub fn fail_next_credits(&self, n: usize) {
        self.state.lock().failing_credits = n;
    }
}

fn injected_failure() -> LoyaltyError {
    LoyaltyError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl OrderRepositoryTrait for InMemoryStore {
    async fn find_owner(&self, number: &str) -> Result<Option<i64>> {
        Ok(self.state.lock().orders.get(number).map(|o| o.user_id))
    }

    async fn insert_new(&self, order: &Order) -> Result<bool> {
        let mut state = self.state.lock();
        if state.orders.contains_key(&order.number) {
            return Ok(false);
        }
        state.orders.insert(order.number.clone(), order.clone());
        Ok(true)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(orders)
    }

    async fn list_pending(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(orders)
    }

    async fn list_uncredited(&self) -> Result<Vec<Order>> {
        let state = self.state.lock();
        Ok(state
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Processed && !state.credits.contains(&o.number))
            .cloned()
            .collect())
    }

    async fn update_status(&self, update: &StatusUpdate) -> Result<bool> {
        let mut state = self.state.lock();
        if state.failing_updates.contains(&update.number) {
            return Err(injected_failure());
        }
        match state.orders.get_mut(&update.number) {
            Some(order) if !order.status.is_terminal() => {
                order.status = update.status;
                order.accrual = update.accrual;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl BalanceLedgerTrait for InMemoryStore {
    async fn credit(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<CreditOutcome> {
        if amount < Decimal::ZERO {
            return Err(LoyaltyError::InvalidSum(amount));
        }

        let mut state = self.state.lock();
        if state.failing_credits > 0 {
            state.failing_credits -= 1;
            return Err(injected_failure());
        }
        if !state.credits.insert(order_number.to_string()) {
            return Ok(CreditOutcome::AlreadyApplied);
        }

        let balance = state
            .balances
            .entry(user_id)
            .or_insert_with(|| Balance::zero(user_id));
        balance.current += amount;

        Ok(CreditOutcome::Applied)
    }

    async fn debit(&self, user_id: i64, order_number: &str, sum: Decimal) -> Result<Withdrawal> {
        if sum <= Decimal::ZERO {
            return Err(LoyaltyError::InvalidSum(sum));
        }

        let mut state = self.state.lock();
        let available = state
            .balances
            .get(&user_id)
            .map(|b| b.current)
            .unwrap_or(Decimal::ZERO);
        if available < sum {
            return Err(LoyaltyError::InsufficientFunds {
                required: sum,
                available,
            });
        }
        if state.withdrawals.iter().any(|w| w.order_number == order_number) {
            return Err(LoyaltyError::WithdrawalAlreadyExists(
                order_number.to_string(),
            ));
        }

        state.next_withdrawal_id += 1;
        let withdrawal = Withdrawal {
            id: state.next_withdrawal_id,
            user_id,
            order_number: order_number.to_string(),
            sum,
            processed_at: Utc::now(),
        };
        state.withdrawals.push(withdrawal.clone());

        let balance = state
            .balances
            .entry(user_id)
            .or_insert_with(|| Balance::zero(user_id));
        balance.current -= sum;
        balance.withdrawn += sum;

        Ok(withdrawal)
    }

    async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        Ok(self
            .state
            .lock()
            .balances
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Balance::zero(user_id)))
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        let mut withdrawals: Vec<Withdrawal> = self
            .state
            .lock()
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| b.processed_at.cmp(&a.processed_at).then(b.id.cmp(&a.id)));
        Ok(withdrawals)
    }
}

// ==================== 脚本化积分计算系统 ====================

/// 脚本化答复
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    /// 204，暂无信息
    NotReady,
    Status(AccrualStatus),
    Processed(Decimal),
    /// 返回未知状态字符串
    UnknownStatus(String),
    /// 服务端错误
    Unavailable,
    RateLimited(Duration),
}

impl ScriptedReply {
    fn to_result(&self, number: &str) -> std::result::Result<Option<AccrualResult>, AccrualError> {
        match self {
            Self::NotReady => Ok(None),
            Self::Status(status) => Ok(Some(AccrualResult::with_status(number, *status))),
            Self::Processed(amount) => Ok(Some(AccrualResult::processed(number, *amount))),
            Self::UnknownStatus(s) => Err(AccrualError::UnknownStatus(s.clone())),
            Self::Unavailable => Err(AccrualError::UnexpectedStatus(503)),
            Self::RateLimited(d) => Err(AccrualError::RateLimited {
                retry_after: Some(*d),
            }),
        }
    }
}

/// 按订单号预设答复的积分计算系统
///
/// 每个订单号对应一个答复队列，依次消费，最后一个答复会一直重复。
/// 未预设的订单号返回“暂无信息”。
#[derive(Default)]
pub struct ScriptedAccrualOracle {
    replies: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
    delay: Option<Duration>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl ScriptedAccrualOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次查询前等待一段时间（用于测试超时）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 单个订单号的查询等待时间，优先于 `with_delay`
    pub fn delay_for(&self, number: &str, delay: Duration) {
        self.delays.lock().insert(number.to_string(), delay);
    }

    pub fn script(&self, number: &str, replies: impl IntoIterator<Item = ScriptedReply>) {
        self.replies
            .lock()
            .insert(number.to_string(), replies.into_iter().collect());
    }

    pub fn calls(&self, number: &str) -> usize {
        self.calls.lock().get(number).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, number: &str) -> ScriptedReply {
        let mut replies = self.replies.lock();
        match replies.get_mut(number) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(ScriptedReply::NotReady),
            Some(queue) => queue.front().cloned().unwrap_or(ScriptedReply::NotReady),
            None => ScriptedReply::NotReady,
        }
    }
}

#[async_trait]
impl AccrualOracle for ScriptedAccrualOracle {
    async fn query(
        &self,
        number: &str,
    ) -> std::result::Result<Option<AccrualResult>, AccrualError> {
        *self.calls.lock().entry(number.to_string()).or_default() += 1;
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.lock().get(number).copied().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.next_reply(number).to_result(number)
    }
}
