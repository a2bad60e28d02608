//! Provider adapters: one per backend family, dispatched by identity.

use serde_json::Value;

use crate::error::{Result, RouterError, Stage};
use crate::models::{ExtraAuth, Message, ProviderConfig, ProviderIdentity, Role, Turn};
use crate::transport::{Transport, WireRequest};

pub mod anthropic;
pub mod circuit;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use circuit::CircuitAdapter;
pub use openai::OpenAiAdapter;

/**
 * \brief 封闭的适配器集合，按 Provider 标识分派。
 */
#[derive(Debug, Clone)]
pub enum Adapter {
    OpenAI(OpenAiAdapter),
    Claude(AnthropicAdapter),
    Circuit(CircuitAdapter),
}

impl Adapter {
    /**
     * \brief 由配置构建对应适配器。
     * \details circuit 缺少 app key 时返回 ConfigurationError。
     */
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        match config.identity {
            ProviderIdentity::OpenAI => Ok(Adapter::OpenAI(OpenAiAdapter::new(
                &config.base_endpoint,
                &config.credential,
            ))),
            ProviderIdentity::Claude => Ok(Adapter::Claude(AnthropicAdapter::new(
                &config.base_endpoint,
                &config.credential,
            ))),
            ProviderIdentity::Circuit => match &config.extra_auth {
                ExtraAuth::CircuitAppKey(app_key) => Ok(Adapter::Circuit(CircuitAdapter::new(
                    &config.base_endpoint,
                    &config.credential,
                    app_key,
                ))),
                ExtraAuth::None => Err(RouterError::configuration(
                    "circuit provider requires an app key",
                )),
            },
        }
    }

    pub fn identity(&self) -> ProviderIdentity {
        match self {
            Adapter::OpenAI(_) => ProviderIdentity::OpenAI,
            Adapter::Claude(_) => ProviderIdentity::Claude,
            Adapter::Circuit(_) => ProviderIdentity::Circuit,
        }
    }

    /**
     * \brief 构造该后端的出站请求；会话不合法时在任何 I/O 之前失败。
     */
    pub fn build_request(
        &self,
        conversation: &[Message],
        model: &str,
        temperature: f64,
    ) -> Result<WireRequest> {
        let turns = validate_conversation(conversation)?;
        Ok(match self {
            Adapter::OpenAI(a) => a.build_request(&turns, model, temperature),
            Adapter::Claude(a) => a.build_request(&turns, model, temperature),
            Adapter::Circuit(a) => a.build_request(&turns, model, temperature),
        })
    }

    /**
     * \brief 把后端响应归一化为纯文本。
     */
    pub fn parse_response(&self, body: &Value) -> Result<String> {
        let parsed = match self {
            Adapter::OpenAI(_) | Adapter::Circuit(_) => openai::extract_text(body),
            Adapter::Claude(_) => anthropic::extract_text(body),
        };
        parsed.map_err(|cause| RouterError::adapter(self.identity(), Stage::Decode, cause))
    }

    /**
     * \brief 完成一次补全：校验、单次往返、解析。
     */
    pub async fn complete(
        &self,
        transport: &dyn Transport,
        conversation: &[Message],
        model: &str,
        temperature: f64,
    ) -> Result<String> {
        let request = self.build_request(conversation, model, temperature)?;
        let body = transport
            .post_json(request)
            .await
            .map_err(|cause| RouterError::adapter(self.identity(), Stage::Transport, cause))?;
        self.parse_response(&body)
    }
}

/**
 * \brief 校验会话：非空、角色合法、内容存在。
 */
pub fn validate_conversation(conversation: &[Message]) -> Result<Vec<Turn<'_>>> {
    if conversation.is_empty() {
        return Err(RouterError::malformed(0, "conversation is empty"));
    }
    conversation
        .iter()
        .enumerate()
        .map(|(index, msg)| {
            if msg.role.is_empty() {
                return Err(RouterError::malformed(index, "missing 'role'"));
            }
            let role = Role::parse(&msg.role).ok_or_else(|| {
                RouterError::malformed(
                    index,
                    format!(
                        "role '{}' is not one of system, user, assistant",
                        msg.role
                    ),
                )
            })?;
            let content = msg
                .content
                .as_deref()
                .ok_or_else(|| RouterError::malformed(index, "missing 'content'"))?;
            Ok(Turn { role, content })
        })
        .collect()
}
