use std::fmt;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::models::Turn;
use crate::transport::WireRequest;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/** \brief 每次调用的输出 token 上限。 */
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

/**
 * \brief Anthropic Messages API 适配器。
 */
#[derive(Clone)]
pub struct AnthropicAdapter {
    base: String,
    api_key: String,
}

impl fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("base", &self.base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl AnthropicAdapter {
    pub fn new(base: &str, api_key: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn build_request(&self, turns: &[Turn<'_>], model: &str, temperature: f64) -> WireRequest {
        let body = json!({
            "model": model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": turns,
            "temperature": temperature,
        });
        WireRequest::post(format!("{}/v1/messages", self.base), body)
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

/**
 * \brief 拼接所有 text 类型块的文本，以换行连接；没有文本块时返回空串。
 */
pub(crate) fn extract_text(v: &Value) -> Result<String> {
    let blocks = match v.get("content") {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::Array(blocks)) => blocks,
        Some(other) => return Err(anyhow!("content is not a block list: {}", other)),
    };
    Ok(blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("\n"))
}
