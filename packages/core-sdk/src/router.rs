use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::adapter::Adapter;
use crate::config::{self, CircuitCredentials, EnvSource, Settings};
use crate::error::{Result, RouterError};
use crate::models::{CompletionRequest, ProviderConfig, ProviderIdentity};
use crate::registry::ProviderRegistry;
use crate::telemetry;
use crate::transport::{HttpTransport, Transport};

/**
 * \brief 路由上下文：调用方显式持有，替代进程级全局 Provider 选择。
 * \details 注册表由读写锁保护；`complete` 只在锁内取配置快照，网络往返期间不持锁。
 */
pub struct RouterContext {
    registry: RwLock<ProviderRegistry>,
    transport: Arc<dyn Transport>,
}

impl RouterContext {
    pub fn new(registry: ProviderRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: RwLock::new(registry),
            transport,
        }
    }

    /**
     * \brief 按设置构建上下文：注册本地代理的 OpenAI/Claude 配置并选定默认 Provider。
     */
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = HttpTransport::new(settings.request_timeout)
            .map_err(|e| RouterError::configuration(format!("http client: {:#}", e)))?;
        Self::with_transport(settings, Arc::new(transport))
    }

    pub fn with_transport(settings: &Settings, transport: Arc<dyn Transport>) -> Result<Self> {
        if settings.telemetry_enabled {
            telemetry::set_log_dir(&settings.log_dir);
            telemetry::set_enabled(true);
        }

        let mut registry = ProviderRegistry::new(settings.provider);
        registry.register(settings.openai_proxy_config())?;
        registry.register(settings.claude_proxy_config())?;
        registry.set_default_model(ProviderIdentity::Circuit, &settings.circuit_model);

        telemetry::log_event(
            "config",
            &format!(
                "router ready provider={} model={}",
                settings.provider,
                settings.model_for(settings.provider)
            ),
        );
        Ok(Self::new(registry, transport))
    }

    /** \brief 读取 `.env` 与进程环境后构建上下文。 */
    pub fn from_env() -> Result<Self> {
        let settings = Settings::from_env(&EnvSource::from_process())?;
        Self::from_settings(&settings)
    }

    fn read(&self) -> RwLockReadGuard<'_, ProviderRegistry> {
        self.registry.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProviderRegistry> {
        self.registry.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /** \brief 注册配置；不完整的配置在此返回 ConfigurationError，而非等到首次补全。 */
    pub fn register(&self, config: ProviderConfig) -> Result<()> {
        let summary = format!(
            "register provider={} model={} base={}",
            config.identity, config.default_model, config.base_endpoint
        );
        let result = self.write().register(config);
        match &result {
            Ok(()) => telemetry::log_event("config", &summary),
            Err(e) => telemetry::log_error("config", &format!("{} rejected: {}", summary, e)),
        }
        result
    }

    /** \brief 整体替换已注册的配置；任一配置不完整时保持原配置。 */
    pub fn reconfigure(&self, configs: Vec<ProviderConfig>) -> Result<()> {
        self.write().replace_all(configs)
    }

    pub fn set_active(&self, name: &str) -> Result<ProviderIdentity> {
        let identity = self.write().set_active(name)?;
        telemetry::log_event("config", &format!("active provider={}", identity));
        Ok(identity)
    }

    pub fn active_identity(&self) -> ProviderIdentity {
        self.read().active_identity()
    }

    pub fn default_model(&self, identity: Option<ProviderIdentity>) -> String {
        self.read().default_model(identity)
    }

    pub fn configured(&self) -> Vec<ProviderIdentity> {
        self.read().configured()
    }

    /** \brief 注册表快照。 */
    pub fn registry(&self) -> ProviderRegistry {
        self.read().clone()
    }

    /**
     * \brief 改为直连 OpenAI 官方 API，Key 缺失时立即返回 ConfigurationError。
     */
    pub fn configure_openai_from_env(&self, env: &EnvSource, api_key_var: &str) -> Result<()> {
        let model = self.default_model(Some(ProviderIdentity::OpenAI));
        let cfg = config::openai_direct_config(env, api_key_var, &model)?;
        self.register(cfg)
    }

    /**
     * \brief 读取 circuit 凭据、换取令牌并注册；不改变当前选择。
     */
    pub async fn configure_circuit_from_env(&self, env: &EnvSource) -> Result<()> {
        let credentials = CircuitCredentials::from_env(env)?;
        let model = self.default_model(Some(ProviderIdentity::Circuit));
        let cfg = config::configure_circuit(self.transport.as_ref(), &credentials, &model).await?;
        self.register(cfg)
    }

    /**
     * \brief 统一入口：交给当前选中的 Provider 完成补全。
     */
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let identity = self.active_identity();
        self.complete_with(identity, request).await
    }

    /**
     * \brief 交给指定 Provider 完成补全，不改变当前选择。
     * \details 未注册配置返回 ProviderNotConfigured；适配器结果原样返回。
     */
    pub async fn complete_with(
        &self,
        identity: ProviderIdentity,
        request: &CompletionRequest,
    ) -> Result<String> {
        if !request.temperature.is_finite() || !(0.0..=1.0).contains(&request.temperature) {
            return Err(RouterError::InvalidTemperature(request.temperature));
        }

        let (config, default_model) = {
            let registry = self.read();
            let config = registry
                .config(identity)
                .cloned()
                .ok_or(RouterError::ProviderNotConfigured(identity))?;
            (config, registry.default_model(Some(identity)))
        };
        let model = request.model.clone().unwrap_or(default_model);
        let adapter = Adapter::from_config(&config)?;

        telemetry::log_event(
            "router.complete",
            &format!(
                "provider={} model={} turns={}",
                identity,
                model,
                request.conversation.len()
            ),
        );
        let result = adapter
            .complete(
                self.transport.as_ref(),
                &request.conversation,
                &model,
                request.temperature,
            )
            .await;
        if let Err(e) = &result {
            telemetry::log_error("router.complete", &format!("{:#}", e));
        }
        result
    }
}
