use std::fmt;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::models::Turn;
use crate::transport::WireRequest;

/**
 * \brief OpenAI 风格 Chat Completions 适配器（官方 API 或本地代理）。
 */
#[derive(Clone)]
pub struct OpenAiAdapter {
    base: String,
    api_key: String,
}

impl fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("base", &self.base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenAiAdapter {
    pub fn new(base: &str, api_key: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn build_request(&self, turns: &[Turn<'_>], model: &str, temperature: f64) -> WireRequest {
        WireRequest::post(
            format!("{}/chat/completions", self.base),
            chat_body(turns, model, temperature),
        )
        .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

/** \brief `{model, messages, temperature}`，Azure 代理在此基础上追加字段。 */
pub(crate) fn chat_body(turns: &[Turn<'_>], model: &str, temperature: f64) -> Value {
    json!({
        "model": model,
        "messages": turns,
        "temperature": temperature,
    })
}

/**
 * \brief 读取 `choices[0].message.content`；content 缺失或为 null 时返回空串。
 */
pub(crate) fn extract_text(v: &Value) -> Result<String> {
    let message = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("response has no choices[0].message: {}", v))?;
    match message.get("content") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(anyhow!("message content is not a string: {}", other)),
    }
}
