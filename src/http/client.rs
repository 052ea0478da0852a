use std::time::{Duration, Instant};

use crate::Result;
use crate::http::request::Request;
use crate::http::response::Response;

/// 连接超时默认值（秒）
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;
/// 响应超时默认值（秒）
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 120;

/// HTTP 客户端
///
/// 内部的 reqwest::Client 自带连接池，clone 开销很小，
/// 多个并发迭代共享同一个连接池
#[derive(Clone, Debug)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self> {
        Self::with_timeouts(
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
        )
    }

    pub fn with_timeouts(connect_timeout: Duration, response_timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(response_timeout)
            .build()?;
        Ok(Self { inner })
    }

    pub async fn execute(&self, request: Request) -> Result<Response> {
        let mut req = self
            .inner
            .request(request.method.to_reqwest(), request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            req = req.body(body);
        }

        let start = Instant::now();
        let response = req.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        let duration = start.elapsed();

        Response::new(status, headers, body, duration)
    }
}
