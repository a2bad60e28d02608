use std::collections::HashMap;

use crate::error::{Result, RouterError};
use crate::models::{ExtraAuth, ProviderConfig, ProviderIdentity};

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-5";
pub const CLAUDE_DEFAULT_MODEL: &str = "claude-sonnet-4";
pub const CIRCUIT_DEFAULT_MODEL: &str = "gpt-4o";

/**
 * \brief 内置默认模型，未注册配置时 default_model 仍可解析。
 */
pub fn builtin_default_model(identity: ProviderIdentity) -> &'static str {
    match identity {
        ProviderIdentity::OpenAI => OPENAI_DEFAULT_MODEL,
        ProviderIdentity::Claude => CLAUDE_DEFAULT_MODEL,
        ProviderIdentity::Circuit => CIRCUIT_DEFAULT_MODEL,
    }
}

/**
 * \brief Provider 注册表：已配置的后端、当前选择和各自默认模型。
 */
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    configs: HashMap<ProviderIdentity, ProviderConfig>,
    default_models: HashMap<ProviderIdentity, String>,
    active: ProviderIdentity,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(ProviderIdentity::Claude)
    }
}

impl ProviderRegistry {
    pub fn new(active: ProviderIdentity) -> Self {
        let default_models = ProviderIdentity::ALL
            .iter()
            .map(|id| (*id, builtin_default_model(*id).to_string()))
            .collect();
        Self {
            configs: HashMap::new(),
            default_models,
            active,
        }
    }

    /**
     * \brief 插入或替换该标识的配置，其默认模型随之更新。
     * \details 配置不完整（如 circuit 缺少 app key）时返回 ConfigurationError，注册表不变。
     */
    pub fn register(&mut self, config: ProviderConfig) -> Result<()> {
        check_config(&config)?;
        self.default_models
            .insert(config.identity, config.default_model.clone());
        self.configs.insert(config.identity, config);
        Ok(())
    }

    /**
     * \brief 整体替换已注册配置（重新配置）。默认模型回到内置值后再按新配置覆盖。
     * \details 任一配置不完整则整体失败，原注册表保持不变。
     */
    pub fn replace_all(&mut self, configs: impl IntoIterator<Item = ProviderConfig>) -> Result<()> {
        let mut next = Self::new(self.active);
        for config in configs {
            next.register(config)?;
        }
        *self = next;
        Ok(())
    }

    /** \brief 按名称选择当前 Provider；名称不在固定集合内返回 UnknownProvider。 */
    pub fn set_active(&mut self, name: &str) -> Result<ProviderIdentity> {
        let identity: ProviderIdentity = name.parse()?;
        Ok(self.set_active_identity(identity))
    }

    pub fn set_active_identity(&mut self, identity: ProviderIdentity) -> ProviderIdentity {
        self.active = identity;
        identity
    }

    pub fn active_identity(&self) -> ProviderIdentity {
        self.active
    }

    pub fn default_model(&self, identity: Option<ProviderIdentity>) -> String {
        let identity = identity.unwrap_or(self.active);
        self.default_models
            .get(&identity)
            .cloned()
            .unwrap_or_else(|| builtin_default_model(identity).to_string())
    }

    /** \brief 覆盖某个 Provider 的默认模型，不要求已注册配置。 */
    pub fn set_default_model(&mut self, identity: ProviderIdentity, model: impl Into<String>) {
        let model = model.into();
        if let Some(cfg) = self.configs.get_mut(&identity) {
            cfg.default_model = model.clone();
        }
        self.default_models.insert(identity, model);
    }

    pub fn config(&self, identity: ProviderIdentity) -> Option<&ProviderConfig> {
        self.configs.get(&identity)
    }

    /** \brief 已注册配置的标识，按固定集合顺序。 */
    pub fn configured(&self) -> Vec<ProviderIdentity> {
        ProviderIdentity::ALL
            .into_iter()
            .filter(|id| self.configs.contains_key(id))
            .collect()
    }
}

fn check_config(config: &ProviderConfig) -> Result<()> {
    if config.identity == ProviderIdentity::Circuit {
        match &config.extra_auth {
            ExtraAuth::CircuitAppKey(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(RouterError::configuration(
                    "circuit provider requires an app key",
                ))
            }
        }
    }
    Ok(())
}
