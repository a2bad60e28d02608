use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::RouterError;

/**
 * \brief 后端 Provider 标识，集合固定，运行期只能在其中选择。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderIdentity {
    OpenAI,
    Claude,
    Circuit,
}

impl ProviderIdentity {
    /** \brief 全部合法标识。 */
    pub const ALL: [ProviderIdentity; 3] = [
        ProviderIdentity::OpenAI,
        ProviderIdentity::Claude,
        ProviderIdentity::Circuit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderIdentity::OpenAI => "openai",
            ProviderIdentity::Claude => "claude",
            ProviderIdentity::Circuit => "circuit",
        }
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderIdentity {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderIdentity::OpenAI),
            "claude" => Ok(ProviderIdentity::Claude),
            "circuit" => Ok(ProviderIdentity::Circuit),
            _ => Err(RouterError::UnknownProvider(s.to_string())),
        }
    }
}

/**
 * \brief 消息角色：system/user/assistant。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /** \brief 严格解析角色名（区分大小写），未知返回 None。 */
    pub fn parse(role: &str) -> Option<Role> {
        match role {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/**
 * \brief 调用方传入的消息结构，与 OpenAI Chat 消息格式对齐。
 * \details 字段允许缺失，以便从松散 JSON 反序列化；合法性在发出请求前统一校验。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    #[serde(default)]
    pub role: String,
    /** \brief 内容，None 表示缺失 */
    #[serde(default)]
    pub content: Option<String>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System.as_str(), content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User.as_str(), content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant.as_str(), content)
    }
}

/**
 * \brief 校验后的消息视图，适配器只序列化这一形态。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Turn<'a> {
    pub role: Role,
    pub content: &'a str,
}

/**
 * \brief 个别适配器需要的额外鉴权字段。
 */
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtraAuth {
    #[default]
    None,
    /** \brief Azure 代理要求塞进 `user` 字段的 app key。 */
    CircuitAppKey(String),
}

/**
 * \brief Provider 配置模型。
 */
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub identity: ProviderIdentity,
    /** \brief 默认模型名 */
    pub default_model: String,
    /** \brief API 基地址 */
    pub base_endpoint: String,
    /** \brief API Key 或访问令牌 */
    pub credential: String,
    pub extra_auth: ExtraAuth,
}

impl ProviderConfig {
    pub fn new(
        identity: ProviderIdentity,
        default_model: impl Into<String>,
        base_endpoint: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            default_model: default_model.into(),
            base_endpoint: base_endpoint.into(),
            credential: credential.into(),
            extra_auth: ExtraAuth::None,
        }
    }

    pub fn with_extra_auth(mut self, extra_auth: ExtraAuth) -> Self {
        self.extra_auth = extra_auth;
        self
    }
}

// Credentials stay out of Debug output so configs can be logged safely.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("identity", &self.identity)
            .field("default_model", &self.default_model)
            .field("base_endpoint", &self.base_endpoint)
            .field("credential", &"<redacted>")
            .field(
                "extra_auth",
                &match self.extra_auth {
                    ExtraAuth::None => "none",
                    ExtraAuth::CircuitAppKey(_) => "circuit-app-key",
                },
            )
            .finish()
    }
}

/**
 * \brief 一次补全请求。
 */
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub conversation: Vec<Message>,
    /** \brief 覆盖默认模型 */
    pub model: Option<String>,
    /** \brief 取值 [0, 1] */
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(conversation: Vec<Message>) -> Self {
        Self {
            conversation,
            model: None,
            temperature: 0.0,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}
