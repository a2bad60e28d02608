use std::fmt;

use thiserror::Error;

use crate::models::ProviderIdentity;

/**
 * \brief 适配器失败所处阶段。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /** \brief 网络、非 2xx 或响应体不是 JSON */
    Transport,
    /** \brief JSON 形状不符合该后端约定 */
    Decode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Transport => f.write_str("transport"),
            Stage::Decode => f.write_str("decode"),
        }
    }
}

/**
 * \brief 路由层统一错误类型。
 */
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown provider '{0}', choose from openai, claude, circuit")]
    UnknownProvider(String),

    #[error("provider '{0}' is selected but not configured")]
    ProviderNotConfigured(ProviderIdentity),

    #[error("malformed conversation at message {index}: {reason}")]
    MalformedConversation { index: usize, reason: String },

    #[error("temperature {0} is outside [0, 1]")]
    InvalidTemperature(f64),

    #[error("{provider} adapter failed during {stage}: {cause:#}")]
    AdapterFailure {
        provider: ProviderIdentity,
        stage: Stage,
        #[source]
        cause: anyhow::Error,
    },
}

impl RouterError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RouterError::Configuration(message.into())
    }

    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        RouterError::MalformedConversation {
            index,
            reason: reason.into(),
        }
    }

    pub fn adapter(provider: ProviderIdentity, stage: Stage, cause: anyhow::Error) -> Self {
        RouterError::AdapterFailure {
            provider,
            stage,
            cause,
        }
    }

    /** \brief 是否为发出请求前即可判定的输入错误（不应重试）。 */
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RouterError::UnknownProvider(_)
                | RouterError::MalformedConversation { .. }
                | RouterError::InvalidTemperature(_)
        )
    }

    /** \brief 错误涉及的 Provider（若可确定）。 */
    pub fn provider(&self) -> Option<ProviderIdentity> {
        match self {
            RouterError::ProviderNotConfigured(p) => Some(*p),
            RouterError::AdapterFailure { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}

pub type Result<T, E = RouterError> = std::result::Result<T, E>;
