use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

/**
 * \brief 一次出站 JSON POST 请求的完整描述。
 */
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Value,
}

impl WireRequest {
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /** \brief 按名称（不区分大小写）取第一个请求头的值。 */
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/**
 * \brief 出站 HTTP 的抽象接缝，适配器只通过它访问网络。
 * \details 每次调用恰好一次往返，不做重试。非 2xx、网络错误和非 JSON 响应体都返回 Err。
 */
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, request: WireRequest) -> Result<Value>;

    /** \brief `application/x-www-form-urlencoded` 请求，用于 OAuth 换取令牌。 */
    async fn post_form(&self, url: &str, headers: &[(String, String)], body: &str)
        -> Result<Value>;
}

/**
 * \brief 基于 reqwest 的默认实现。
 */
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chatroute/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, request: WireRequest) -> Result<Value> {
        let headers = header_map(&request.headers)?;
        let mut builder = self
            .client
            .post(&request.url)
            .headers(headers)
            .header(CONTENT_TYPE, "application/json")
            .json(&request.body);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let resp = builder
            .send()
            .await
            .with_context(|| format!("POST {}", request.url))?;
        read_json(resp).await
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &str,
    ) -> Result<Value> {
        let resp = self
            .client
            .post(url)
            .headers(header_map(headers)?)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        read_json(resp).await
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header '{}'", name))?;
        map.insert(name, value);
    }
    Ok(map)
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .with_context(|| format!("failed to read response body ({})", status))?;
    if !status.is_success() {
        return Err(anyhow!("request failed: {} -> {}", status, text));
    }
    serde_json::from_str(&text).with_context(|| format!("response body is not JSON: {}", text))
}
