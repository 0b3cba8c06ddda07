//! 基于 reqwest 的积分计算系统客户端

use async_trait::async_trait;
use reqwest::{StatusCode, header::RETRY_AFTER};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use loyalty_shared::config::AccrualConfig;

use super::{AccrualError, AccrualOracle, AccrualResponse, AccrualResult};

/// HTTP 积分计算系统客户端
///
/// 调用 `GET {base_url}/api/orders/{number}`：
/// - 200：解析响应体
/// - 204：暂无该订单信息
/// - 429：限流，携带 `Retry-After`
/// - 其它：非预期状态码
#[derive(Clone)]
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccrualClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AccrualError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccrualError::Transport(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&base_url.into()),
        })
    }

    pub fn from_config(config: &AccrualConfig) -> Result<Self, AccrualError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

#[async_trait]
impl AccrualOracle for HttpAccrualClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn query(&self, number: &str) -> Result<Option<AccrualResult>, AccrualError> {
        let resp = self
            .client
            .get(self.order_url(number))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match resp.status() {
            StatusCode::OK => {
                let body: AccrualResponse = resp
                    .json()
                    .await
                    .map_err(|e| AccrualError::Decode(e.to_string()))?;
                let result = body.into_result()?;
                debug!(status = %result.status.as_str(), "积分计算系统返回订单状态");
                Ok(Some(result))
            }
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                warn!(?retry_after, "积分计算系统限流");
                Err(AccrualError::RateLimited { retry_after })
            }
            other => Err(AccrualError::UnexpectedStatus(other.as_u16())),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AccrualError {
    if e.is_timeout() {
        AccrualError::Timeout
    } else {
        AccrualError::Transport(e.to_string())
    }
}

/// 补全协议并去掉末尾的 `/`
///
/// 部署时地址常以 `host:port` 形式传入
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
