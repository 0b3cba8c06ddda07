//! HTTP 接口测试
//!
//! 路由 + 认证中间件 + 服务层，存储使用内存实现

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use futures::future::join_all;
use loyalty_core::test_utils::{InMemoryStore, luhn_check_digit, valid_order_number};
use loyalty_core::{MAX_ORDER_NUMBER_LEN, Order, OrderService, OrderStatus, WithdrawalService};
use loyalty_server::{
    auth::{JwtConfig, JwtManager},
    routes,
    state::AppState,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

const ALICE: i64 = 1;
const BOB: i64 = 2;

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    jwt: Arc<JwtManager>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let order_service = Arc::new(OrderService::new(store.clone(), store.clone()));
        let withdrawal_service = Arc::new(WithdrawalService::new(store.clone()));
        let jwt = Arc::new(JwtManager::new(JwtConfig::default()));

        let state = AppState::new(order_service, withdrawal_service, jwt.clone());
        Self {
            router: routes::app(state),
            store,
            jwt,
        }
    }

    fn token(&self, user_id: i64) -> String {
        self.jwt.generate_token(user_id).unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn upload(&self, user_id: i64, body: &str) -> StatusCode {
        let request = Request::post("/api/user/orders")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token(user_id)))
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await.0
    }

    async fn get(&self, user_id: i64, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token(user_id)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn withdraw(&self, user_id: i64, body: &str) -> (StatusCode, Value) {
        let request = Request::post("/api/user/balance/withdraw")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token(user_id)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}

// ==================== 认证 ====================

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    let request = Request::get("/api/user/orders").body(Body::empty()).unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = TestApp::new();
    let request = Request::get("/api/user/balance")
        .header(header::AUTHORIZATION, "Bearer not.a.token")
        .body(Body::empty())
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_from_other_secret_is_unauthorized() {
    let app = TestApp::new();
    let forged = JwtManager::new(JwtConfig {
        secret: "forged".to_string(),
        ..Default::default()
    })
    .generate_token(ALICE)
    .unwrap();

    let request = Request::get("/api/user/balance")
        .header(header::AUTHORIZATION, format!("Bearer {forged}"))
        .body(Body::empty())
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ==================== 订单 ====================

#[tokio::test]
async fn test_upload_order_outcomes() {
    let app = TestApp::new();

    assert_eq!(app.upload(ALICE, "79927398713").await, StatusCode::ACCEPTED);
    assert_eq!(app.upload(ALICE, "79927398713").await, StatusCode::OK);
    assert_eq!(app.upload(BOB, "79927398713").await, StatusCode::CONFLICT);
    assert_eq!(app.upload(ALICE, "1234567890").await, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.upload(ALICE, "7992739871a").await, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.upload(ALICE, "   ").await, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.order_count(), 1);
    assert_eq!(
        app.store.order("79927398713").map(|o| (o.user_id, o.status)),
        Some((ALICE, OrderStatus::New))
    );
}

#[tokio::test]
async fn test_upload_trims_whitespace() {
    let app = TestApp::new();
    assert_eq!(app.upload(ALICE, " 12345678903\n").await, StatusCode::ACCEPTED);
    assert!(app.store.order("12345678903").is_some());
}

#[tokio::test]
async fn test_overlong_order_number_is_unprocessable() {
    let app = TestApp::new();
    app.store.seed_balance(ALICE, Decimal::new(500, 0));

    let payload = "1".repeat(MAX_ORDER_NUMBER_LEN);
    let overlong = format!("{payload}{}", luhn_check_digit(&payload));
    assert_eq!(overlong.len(), MAX_ORDER_NUMBER_LEN + 1);

    assert_eq!(
        app.upload(ALICE, &overlong).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    let (status, body) = app
        .withdraw(ALICE, &json!({"order": overlong, "sum": 10}).to_string())
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_ORDER_NUMBER");

    assert_eq!(app.store.order_count(), 0);
    assert_eq!(app.store.withdrawal_count(), 0);
}

#[tokio::test]
async fn test_list_orders_empty_is_no_content() {
    let app = TestApp::new();
    let (status, body) = app.get(ALICE, "/api/user/orders").await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_list_orders_newest_first() {
    let app = TestApp::new();
    let now = Utc::now();

    let mut older = Order::new("79927398713", ALICE);
    older.uploaded_at = now - Duration::minutes(10);
    let mut newer = Order::new("12345678903", ALICE);
    newer.uploaded_at = now;
    newer.status = OrderStatus::Processed;
    newer.accrual = Some(Decimal::new(500, 0));
    let foreign = Order::new("4111111111111111", BOB);

    app.store.seed_order(older);
    app.store.seed_order(newer);
    app.store.seed_order(foreign);

    let (status, body) = app.get(ALICE, "/api/user/orders").await;
    assert_eq!(status, StatusCode::OK);

    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["number"], "12345678903");
    assert_eq!(items[0]["status"], "PROCESSED");
    assert_eq!(items[0]["accrual"], json!(500.0));
    assert_eq!(items[1]["number"], "79927398713");
    assert_eq!(items[1]["status"], "NEW");
    assert!(items[1].get("accrual").is_none());
    assert!(items[1]["uploaded_at"].is_string());
}

// ==================== 余额与提现 ====================

#[tokio::test]
async fn test_fresh_balance_is_zero() {
    let app = TestApp::new();
    let (status, body) = app.get(ALICE, "/api/user/balance").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"current": 0.0, "withdrawn": 0.0}));
}

#[tokio::test]
async fn test_withdraw_flow() {
    let app = TestApp::new();
    app.store.seed_balance(ALICE, Decimal::new(500, 0));

    let (status, body) = app
        .withdraw(ALICE, r#"{"order":"2377225624","sum":751}"#)
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(app.store.withdrawal_count(), 0);

    let (status, _) = app
        .withdraw(ALICE, r#"{"order":"2377225624","sum":100.5}"#)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, balance) = app.get(ALICE, "/api/user/balance").await;
    assert_eq!(balance, json!({"current": 399.5, "withdrawn": 100.5}));

    // 同一引用号不能重复扣减
    let (status, body) = app
        .withdraw(ALICE, r#"{"order":"2377225624","sum":1}"#)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "WITHDRAWAL_ALREADY_EXISTS");

    let (status, body) = app.get(ALICE, "/api/user/withdrawals").await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["order"], "2377225624");
    assert_eq!(items[0]["sum"], json!(100.5));
    assert!(items[0]["processed_at"].is_string());
}

#[tokio::test]
async fn test_withdraw_validation() {
    let app = TestApp::new();
    app.store.seed_balance(ALICE, Decimal::new(500, 0));

    let (status, body) = app
        .withdraw(ALICE, r#"{"order":"1234567890","sum":10}"#)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_ORDER_NUMBER");

    let (status, body) = app
        .withdraw(ALICE, r#"{"order":"2377225624","sum":0}"#)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_SUM");

    let (status, body) = app.withdraw(ALICE, r#"{"order":"2377225624""#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    assert_eq!(app.store.withdrawal_count(), 0);
}

#[tokio::test]
async fn test_concurrent_withdrawals_never_overdraw() {
    let app = TestApp::new();
    app.store.seed_balance(ALICE, Decimal::new(100, 0));

    // 20 次并发提现 15，最多成功 6 次
    let attempts = (0..20u64).map(|i| {
        let body = json!({"order": valid_order_number(3_000_000 + i), "sum": 15}).to_string();
        let app = &app;
        async move { app.withdraw(ALICE, &body).await.0 }
    });
    let statuses = join_all(attempts).await;

    let succeeded = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert_eq!(succeeded, 6);
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::OK || *s == StatusCode::PAYMENT_REQUIRED)
    );

    let (_, balance) = app.get(ALICE, "/api/user/balance").await;
    assert_eq!(balance, json!({"current": 10.0, "withdrawn": 90.0}));
    assert_eq!(app.store.withdrawal_count(), 6);
}

#[tokio::test]
async fn test_withdrawals_empty_is_no_content() {
    let app = TestApp::new();
    let (status, _) = app.get(ALICE, "/api/user/withdrawals").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_balances_are_per_user() {
    let app = TestApp::new();
    app.store.seed_balance(ALICE, Decimal::new(100, 0));

    let (status, _) = app
        .withdraw(BOB, r#"{"order":"2377225624","sum":10}"#)
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (_, alice) = app.get(ALICE, "/api/user/balance").await;
    assert_eq!(alice["current"], json!(100.0));
}

// ==================== 探针 ====================

#[tokio::test]
async fn test_probes_are_public() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app
        .send(Request::get("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "ok");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
}
