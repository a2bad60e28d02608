use std::fmt;

use crate::adapter::openai::chat_body;
use crate::models::Turn;
use crate::transport::WireRequest;

pub const API_VERSION: &str = "2024-12-01-preview";

/**
 * \brief Azure OpenAI 代理（circuit）适配器。
 * \details 请求体与 OpenAI 相同，但必须在 `user` 字段里带上 `{"appkey": "<key>"}` 文本，后端据此路由计费。
 */
#[derive(Clone)]
pub struct CircuitAdapter {
    endpoint: String,
    access_token: String,
    app_key: String,
}

impl fmt::Debug for CircuitAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitAdapter")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

impl CircuitAdapter {
    pub fn new(endpoint: &str, access_token: &str, app_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            app_key: app_key.to_string(),
        }
    }

    pub fn build_request(&self, turns: &[Turn<'_>], model: &str, temperature: f64) -> WireRequest {
        let mut body = chat_body(turns, model, temperature);
        body["user"] = app_key_field(&self.app_key).into();
        WireRequest::post(
            format!(
                "{}/openai/deployments/{}/chat/completions",
                self.endpoint, model
            ),
            body,
        )
        .query("api-version", API_VERSION)
        .header("api-key", self.access_token.as_str())
    }
}

/**
 * \brief 后端规定的固定格式，不经 JSON 序列化器，逐字节保持。
 */
pub fn app_key_field(app_key: &str) -> String {
    format!(r#"{{"appkey": "{}"}}"#, app_key)
}
