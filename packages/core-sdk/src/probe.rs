use crate::models::{CompletionRequest, Message, ProviderIdentity};
use crate::router::RouterContext;
use crate::telemetry;

pub const DEFAULT_PROBE_PHRASE: &str = "Setup verified! Ready to learn core techniques.";

/**
 * \brief 连通性探测结果。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /** \brief 响应中是否包含期望短语（不区分大小写） */
    pub ok: bool,
    /** \brief 原始响应文本，失败时为错误描述 */
    pub raw: String,
    pub provider: ProviderIdentity,
    pub model: String,
}

impl ProbeReport {
    pub fn as_tuple(&self) -> (bool, &str) {
        (self.ok, &self.raw)
    }
}

/**
 * \brief 让当前 Provider 原样复述一句话，用于确认配置可用。
 * \details 从不返回错误：任何失败都以 ok=false 和错误文本体现。
 */
pub async fn probe(ctx: &RouterContext, expected_phrase: &str) -> ProbeReport {
    let provider = ctx.active_identity();
    let model = ctx.default_model(Some(provider));
    let request = CompletionRequest::new(vec![Message::user(format!(
        "Respond with exactly: '{}'",
        expected_phrase
    ))]);

    let (ok, raw) = match ctx.complete_with(provider, &request).await {
        Ok(text) => (
            text.to_lowercase()
                .contains(&expected_phrase.to_lowercase()),
            text,
        ),
        Err(e) => (false, e.to_string()),
    };

    if ok {
        telemetry::log_event("probe", &format!("provider={} model={} ok", provider, model));
    } else {
        telemetry::log_error(
            "probe",
            &format!("provider={} model={} unexpected: {}", provider, model, raw),
        );
    }

    ProbeReport {
        ok,
        raw,
        provider,
        model,
    }
}
