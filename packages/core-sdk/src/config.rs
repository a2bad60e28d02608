use std::{collections::HashMap, path::PathBuf, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, RouterError};
use crate::models::{ExtraAuth, ProviderConfig, ProviderIdentity};
use crate::registry::builtin_default_model;
use crate::telemetry;
use crate::transport::Transport;

pub const DEFAULT_OPENAI_PROXY_URL: &str = "http://localhost:7711/v1";
pub const DEFAULT_CLAUDE_PROXY_URL: &str = "http://localhost:7711";
pub const DEFAULT_PROXY_API_KEY: &str = "dummy-key";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CIRCUIT_TOKEN_URL: &str = "https://id.cisco.com/oauth2/default/v1/token";
pub const DEFAULT_CIRCUIT_ENDPOINT: &str = "https://chat-ai.cisco.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/**
 * \brief 环境变量快照。空字符串视为未设置。
 */
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /**
     * \brief 先加载工作目录下的 `.env`（不存在则忽略），再读取进程环境。
     */
    pub fn from_process() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /** \brief 必填变量，缺失时返回带变量名的 ConfigurationError。 */
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key).map(str::to_string).ok_or_else(|| {
            RouterError::configuration(format!(
                "environment variable '{}' not set, add it to your .env file or export it in your shell",
                key
            ))
        })
    }
}

/**
 * \brief 会话级设置：默认 Provider、各家默认模型、本地代理地址等。
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: ProviderIdentity,
    pub openai_model: String,
    pub claude_model: String,
    pub circuit_model: String,
    pub openai_base_url: String,
    pub claude_base_url: String,
    pub proxy_api_key: String,
    pub request_timeout: Duration,
    pub telemetry_enabled: bool,
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderIdentity::Claude,
            openai_model: builtin_default_model(ProviderIdentity::OpenAI).to_string(),
            claude_model: builtin_default_model(ProviderIdentity::Claude).to_string(),
            circuit_model: builtin_default_model(ProviderIdentity::Circuit).to_string(),
            openai_base_url: DEFAULT_OPENAI_PROXY_URL.to_string(),
            claude_base_url: DEFAULT_CLAUDE_PROXY_URL.to_string(),
            proxy_api_key: DEFAULT_PROXY_API_KEY.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            telemetry_enabled: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /**
     * \brief 从环境读取设置，未设置的项使用默认值，非法值立即报错。
     */
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        let defaults = Settings::default();
        let provider = match env.get("CHATROUTE_PROVIDER") {
            Some(name) => name.parse::<ProviderIdentity>().map_err(|_| {
                RouterError::configuration(format!(
                    "CHATROUTE_PROVIDER='{}' is not one of openai, claude, circuit",
                    name
                ))
            })?,
            None => defaults.provider,
        };
        let request_timeout = match env.get("CHATROUTE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    RouterError::configuration(format!(
                        "CHATROUTE_TIMEOUT_SECS='{}' is not a whole number of seconds",
                        raw
                    ))
                })?;
                if secs == 0 {
                    return Err(RouterError::configuration(
                        "CHATROUTE_TIMEOUT_SECS must be greater than zero",
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };
        let telemetry_enabled = match env.get("CHATROUTE_TELEMETRY") {
            Some(raw) => parse_bool(raw).ok_or_else(|| {
                RouterError::configuration(format!(
                    "CHATROUTE_TELEMETRY='{}' is not a boolean",
                    raw
                ))
            })?,
            None => defaults.telemetry_enabled,
        };

        Ok(Self {
            provider,
            openai_model: env.get_or("CHATROUTE_OPENAI_MODEL", &defaults.openai_model),
            claude_model: env.get_or("CHATROUTE_CLAUDE_MODEL", &defaults.claude_model),
            circuit_model: env.get_or("CHATROUTE_CIRCUIT_MODEL", &defaults.circuit_model),
            openai_base_url: env.get_or("CHATROUTE_OPENAI_BASE_URL", &defaults.openai_base_url),
            claude_base_url: env.get_or("CHATROUTE_CLAUDE_BASE_URL", &defaults.claude_base_url),
            proxy_api_key: env.get_or("CHATROUTE_PROXY_API_KEY", &defaults.proxy_api_key),
            request_timeout,
            telemetry_enabled,
            log_dir: env
                .get("CHATROUTE_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        })
    }

    pub fn model_for(&self, identity: ProviderIdentity) -> &str {
        match identity {
            ProviderIdentity::OpenAI => &self.openai_model,
            ProviderIdentity::Claude => &self.claude_model,
            ProviderIdentity::Circuit => &self.circuit_model,
        }
    }

    /** \brief 经本地代理访问的 OpenAI 风格配置。 */
    pub fn openai_proxy_config(&self) -> ProviderConfig {
        ProviderConfig::new(
            ProviderIdentity::OpenAI,
            &self.openai_model,
            &self.openai_base_url,
            &self.proxy_api_key,
        )
    }

    /** \brief 经本地代理访问的 Claude 配置。 */
    pub fn claude_proxy_config(&self) -> ProviderConfig {
        ProviderConfig::new(
            ProviderIdentity::Claude,
            &self.claude_model,
            &self.claude_base_url,
            &self.proxy_api_key,
        )
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/**
 * \brief 直连 OpenAI 官方 API 的配置，API Key 从指定环境变量读取。
 */
pub fn openai_direct_config(
    env: &EnvSource,
    api_key_var: &str,
    model: &str,
) -> Result<ProviderConfig> {
    let api_key = env.require(api_key_var)?;
    Ok(ProviderConfig::new(
        ProviderIdentity::OpenAI,
        model,
        OPENAI_API_URL,
        api_key,
    ))
}

/**
 * \brief circuit（Azure OpenAI 代理）所需凭据。
 */
#[derive(Clone, PartialEq, Eq)]
pub struct CircuitCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub app_key: String,
    pub token_url: String,
    pub endpoint: String,
}

impl std::fmt::Debug for CircuitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitCredentials")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/** \brief circuit 凭据变量：(首选名, 兼容的 CISCO_* 旧名)。 */
const CIRCUIT_CREDENTIAL_VARS: [(&str, &str); 3] = [
    ("CIRCUIT_CLIENT_ID", "CISCO_CLIENT_ID"),
    ("CIRCUIT_CLIENT_SECRET", "CISCO_CLIENT_SECRET"),
    ("CIRCUIT_APP_KEY", "CISCO_OPENAI_APP_KEY"),
];

impl CircuitCredentials {
    /**
     * \brief 读取 CIRCUIT_CLIENT_ID / CIRCUIT_CLIENT_SECRET / CIRCUIT_APP_KEY，缺任何一个都报错并列出缺失项。
     * \details 首选名未设置时回退到 CISCO_CLIENT_ID / CISCO_CLIENT_SECRET / CISCO_OPENAI_APP_KEY。
     */
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        let mut found = Vec::with_capacity(CIRCUIT_CREDENTIAL_VARS.len());
        let mut missing = Vec::new();
        for (primary, legacy) in CIRCUIT_CREDENTIAL_VARS {
            match env.get(primary).or_else(|| env.get(legacy)) {
                Some(v) => found.push(v.to_string()),
                None => missing.push(format!("{} (or {})", primary, legacy)),
            }
        }
        if !missing.is_empty() {
            return Err(RouterError::configuration(format!(
                "{} must be set in your environment to use circuit",
                missing.join(", ")
            )));
        }
        let [client_id, client_secret, app_key]: [String; 3] = found
            .try_into()
            .map_err(|_| RouterError::configuration("circuit credentials incomplete"))?;
        Ok(Self {
            client_id,
            client_secret,
            app_key,
            token_url: env.get_or("CIRCUIT_TOKEN_URL", DEFAULT_CIRCUIT_TOKEN_URL),
            endpoint: env.get_or("CIRCUIT_ENDPOINT", DEFAULT_CIRCUIT_ENDPOINT),
        })
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(raw.as_bytes()))
    }
}

/**
 * \brief 用 client-credentials 换取访问令牌，并生成 circuit 的 ProviderConfig。
 * \details 发生在配置阶段，任何失败都以 ConfigurationError 返回。
 */
pub async fn configure_circuit(
    transport: &dyn Transport,
    credentials: &CircuitCredentials,
    model: &str,
) -> Result<ProviderConfig> {
    let headers = vec![
        ("Accept".to_string(), "*/*".to_string()),
        ("Authorization".to_string(), credentials.basic_auth()),
    ];
    let reply = transport
        .post_form(
            &credentials.token_url,
            &headers,
            "grant_type=client_credentials",
        )
        .await
        .map_err(|e| {
            telemetry::log_error("config", &format!("circuit token exchange failed: {:#}", e));
            RouterError::configuration(format!("circuit token exchange failed: {:#}", e))
        })?;
    let token = reply
        .get("access_token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            RouterError::configuration("circuit token response has no access_token")
        })?;

    telemetry::log_event(
        "config",
        &format!("circuit configured endpoint={} model={}", credentials.endpoint, model),
    );
    Ok(ProviderConfig::new(
        ProviderIdentity::Circuit,
        model,
        &credentials.endpoint,
        token,
    )
    .with_extra_auth(ExtraAuth::CircuitAppKey(credentials.app_key.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubTransport;
    use serde_json::json;

    fn circuit_env() -> EnvSource {
        EnvSource::from_pairs([
            ("CIRCUIT_CLIENT_ID", "id"),
            ("CIRCUIT_CLIENT_SECRET", "secret"),
            ("CIRCUIT_APP_KEY", "k1"),
            ("CIRCUIT_TOKEN_URL", "https://id.example.com/token"),
        ])
    }

    #[test]
    fn test_settings_defaults() {
        let s = Settings::from_env(&EnvSource::default()).expect("settings");
        assert_eq!(s, Settings::default());
        assert_eq!(s.provider, ProviderIdentity::Claude);
        assert_eq!(s.model_for(ProviderIdentity::Circuit), "gpt-4o");
        assert_eq!(s.openai_proxy_config().base_endpoint, DEFAULT_OPENAI_PROXY_URL);
        assert_eq!(s.claude_proxy_config().credential, DEFAULT_PROXY_API_KEY);
    }

    #[test]
    fn test_settings_overrides() {
        let env = EnvSource::from_pairs([
            ("CHATROUTE_PROVIDER", "OpenAI"),
            ("CHATROUTE_OPENAI_MODEL", "gpt-4.1"),
            ("CHATROUTE_TIMEOUT_SECS", "5"),
            ("CHATROUTE_TELEMETRY", "yes"),
            ("CHATROUTE_LOG_DIR", "/tmp/chatroute"),
            ("CHATROUTE_CLAUDE_MODEL", "   "),
        ]);
        let s = Settings::from_env(&env).expect("settings");
        assert_eq!(s.provider, ProviderIdentity::OpenAI);
        assert_eq!(s.openai_model, "gpt-4.1");
        assert_eq!(s.claude_model, "claude-sonnet-4");
        assert_eq!(s.request_timeout, Duration::from_secs(5));
        assert!(s.telemetry_enabled);
        assert_eq!(s.log_dir, PathBuf::from("/tmp/chatroute"));
    }

    #[test]
    fn test_settings_invalid_values_are_configuration_errors() {
        for (key, value) in [
            ("CHATROUTE_PROVIDER", "gemini"),
            ("CHATROUTE_TIMEOUT_SECS", "soon"),
            ("CHATROUTE_TIMEOUT_SECS", "0"),
            ("CHATROUTE_TELEMETRY", "maybe"),
        ] {
            let err = Settings::from_env(&EnvSource::from_pairs([(key, value)])).unwrap_err();
            assert!(
                matches!(err, RouterError::Configuration(ref m) if m.contains(key)),
                "{key}={value}: {err}"
            );
        }
    }

    #[test]
    fn test_openai_direct_requires_key() {
        let err = openai_direct_config(&EnvSource::default(), "OPENAI_API_KEY", "gpt-5")
            .unwrap_err();
        assert!(matches!(err, RouterError::Configuration(ref m) if m.contains("OPENAI_API_KEY")));

        let env = EnvSource::from_pairs([("OPENAI_API_KEY", "sk-1")]);
        let cfg = openai_direct_config(&env, "OPENAI_API_KEY", "gpt-5").expect("config");
        assert_eq!(cfg.base_endpoint, OPENAI_API_URL);
        assert_eq!(cfg.credential, "sk-1");
    }

    #[test]
    fn test_circuit_credentials_list_missing_vars() {
        let env = EnvSource::from_pairs([("CIRCUIT_CLIENT_ID", "id")]);
        let err = CircuitCredentials::from_env(&env).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("CIRCUIT_CLIENT_SECRET"));
        assert!(msg.contains("CIRCUIT_APP_KEY"));
        assert!(!msg.contains("CIRCUIT_CLIENT_ID"));
        assert!(msg.contains("CISCO_OPENAI_APP_KEY"));

        let creds = CircuitCredentials::from_env(&circuit_env()).expect("creds");
        assert_eq!(creds.endpoint, DEFAULT_CIRCUIT_ENDPOINT);
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("secret"));
        assert!(!dbg.contains("k1"));
    }

    #[test]
    fn test_circuit_credentials_accept_cisco_names() {
        let env = EnvSource::from_pairs([
            ("CISCO_CLIENT_ID", "legacy-id"),
            ("CISCO_CLIENT_SECRET", "legacy-secret"),
            ("CISCO_OPENAI_APP_KEY", "legacy-key"),
            ("CIRCUIT_CLIENT_ID", "id"),
        ]);
        let creds = CircuitCredentials::from_env(&env).expect("creds");
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.client_secret, "legacy-secret");
        assert_eq!(creds.app_key, "legacy-key");
        assert_eq!(creds.token_url, DEFAULT_CIRCUIT_TOKEN_URL);
    }

    #[tokio::test]
    async fn test_configure_circuit_exchanges_token() {
        let stub = StubTransport::replying(json!({"access_token": "tok-1", "expires_in": 3600}));
        let creds = CircuitCredentials::from_env(&circuit_env()).expect("creds");
        let cfg = configure_circuit(&stub, &creds, "gpt-4o")
            .await
            .expect("configure");

        assert_eq!(cfg.identity, ProviderIdentity::Circuit);
        assert_eq!(cfg.credential, "tok-1");
        assert_eq!(cfg.extra_auth, ExtraAuth::CircuitAppKey("k1".into()));

        let forms = stub.forms();
        assert_eq!(forms.len(), 1);
        let (url, headers, body) = &forms[0];
        assert_eq!(url, "https://id.example.com/token");
        assert_eq!(body, "grant_type=client_credentials");
        // base64("id:secret")
        assert!(headers.contains(&(
            "Authorization".to_string(),
            "Basic aWQ6c2VjcmV0".to_string()
        )));
    }

    #[tokio::test]
    async fn test_configure_circuit_failures_are_configuration_errors() {
        let creds = CircuitCredentials::from_env(&circuit_env()).expect("creds");

        let stub = StubTransport::failing("request failed: 401 Unauthorized -> nope");
        let err = configure_circuit(&stub, &creds, "gpt-4o").await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(ref m) if m.contains("401")));

        let stub = StubTransport::replying(json!({"token_type": "Bearer"}));
        let err = configure_circuit(&stub, &creds, "gpt-4o").await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(ref m) if m.contains("access_token")));
    }
}
