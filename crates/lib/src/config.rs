//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `./config.json`) and environment. Secrets
//! (messaging credentials, provider API keys) normally come from the environment;
//! env values override the file. [`Settings::resolve`] validates everything once at
//! startup so a misconfigured process never starts serving.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "WA_BRIDGE_CONFIG_PATH";
pub const ENV_ACCOUNT_SID: &str = "TWILIO_ACCOUNT_SID";
pub const ENV_AUTH_TOKEN: &str = "TWILIO_AUTH_TOKEN";
pub const ENV_PHONE: &str = "TWILIO_PHONE";
pub const ENV_GEMINI_KEY: &str = "GEMINI_API_KEY";
pub const ENV_HUGGINGFACE_KEY: &str = "HUGGINGFACE_API_KEY";
pub const ENV_PORT: &str = "PORT";

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Sorry, I'm having trouble processing your request. Please try again later.";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Inbound webhook behavior (path, reply mode, fallback, signature check).
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Messaging provider (Twilio) credentials and endpoint.
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Text-generation provider selection and options.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for HTTP (default 3000). Overridden by PORT env.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    3000
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// How the generated reply reaches the sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyMode {
    /// Reply is pushed through the provider's send API; the webhook response is a bare "OK".
    #[default]
    OutOfBand,
    /// Reply is embedded in the webhook response as a `<Response><Message>` document.
    Inline,
}

impl ReplyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplyMode::OutOfBand => "outOfBand",
            ReplyMode::Inline => "inline",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Route the provider POSTs to (default "/whatsapp").
    #[serde(default = "default_webhook_path")]
    pub path: String,

    #[serde(default)]
    pub reply_mode: ReplyMode,

    /// Apology text sent to the user when generation fails (out-of-band mode only).
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// When true, require a valid X-Twilio-Signature on every webhook POST.
    #[serde(default)]
    pub verify_signature: bool,

    /// Externally visible URL of the webhook, as configured at the provider. Required for signature checks.
    pub public_url: Option<String>,
}

fn default_webhook_path() -> String {
    "/whatsapp".to_string()
}

fn default_fallback_message() -> String {
    DEFAULT_FALLBACK_MESSAGE.to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: default_webhook_path(),
            reply_mode: ReplyMode::default(),
            fallback_message: default_fallback_message(),
            verify_signature: false,
            public_url: None,
        }
    }
}

/// Twilio account settings. Each credential is overridden by its env variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Sender number without the channel scheme (e.g. "+14155238886").
    pub phone_number: Option<String>,
    /// API root (default https://api.twilio.com). Useful for tests and proxies.
    pub api_base: Option<String>,
    #[serde(default = "default_messaging_timeout")]
    pub timeout_secs: u64,
}

fn default_messaging_timeout() -> u64 {
    15
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            phone_number: None,
            api_base: None,
            timeout_secs: default_messaging_timeout(),
        }
    }
}

/// Which text-generation backend answers messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Generative-language API (generateContent).
    Gemini,
    /// Hosted-inference API returning `[{ "generated_text": … }]`.
    HuggingFace,
    /// Replies with the incoming text. Needs no API key.
    Echo,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Echo => "echo",
        }
    }

    /// Env variable holding this provider's API key, if it needs one.
    pub fn key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::Gemini => Some(ENV_GEMINI_KEY),
            ProviderKind::HuggingFace => Some(ENV_HUGGINGFACE_KEY),
            ProviderKind::Echo => None,
        }
    }
}

/// One content-safety threshold passed to the generative-language API verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySetting {
    /// e.g. "HARM_CATEGORY_HARASSMENT".
    pub category: String,
    /// e.g. "BLOCK_MEDIUM_AND_ABOVE".
    pub threshold: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Explicit provider. When absent, inferred from which provider key env var is set.
    pub provider: Option<ProviderKind>,
    /// API key. Overridden by the provider's env variable (GEMINI_API_KEY / HUGGINGFACE_API_KEY).
    pub api_key: Option<String>,
    /// Provider model id; each provider has its own default.
    pub model: Option<String>,
    /// API root override.
    pub base_url: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Only used by the gemini provider.
    #[serde(default)]
    pub safety_settings: Vec<SafetySetting>,
}

fn default_generation_timeout() -> u64 {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: None,
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: default_generation_timeout(),
            safety_settings: Vec::new(),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"))
}

/// Load config from the given path, WA_BRIDGE_CONFIG_PATH, or ./config.json. Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Validated Twilio credentials.
#[derive(Clone)]
pub struct MessagingCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub phone_number: String,
}

impl std::fmt::Debug for MessagingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

/// Messaging provider settings after validation.
#[derive(Debug, Clone)]
pub struct MessagingSettings {
    pub credentials: MessagingCredentials,
    pub api_base: Option<String>,
    pub timeout: Duration,
}

/// Generation provider settings after validation. `api_key` is Some for every provider that needs one.
#[derive(Clone)]
pub struct GeneratorSettings {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub safety_settings: Vec<SafetySetting>,
}

impl std::fmt::Debug for GeneratorSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorSettings")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("safety_settings", &self.safety_settings)
            .finish()
    }
}

/// Fully resolved runtime settings. Only constructed through [`Settings::resolve`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub messaging: MessagingSettings,
    pub generation: GeneratorSettings,
}

impl Settings {
    /// Merge env overrides into `config` and validate. Reads the process environment.
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Like [`Settings::resolve`] but with an explicit env lookup.
    pub fn resolve_with<F>(config: &Config, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |name: &str| env(name).and_then(non_empty);

        let mut server = config.server.clone();
        if let Some(port) = env_value(ENV_PORT) {
            server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} is not a port: {}", ENV_PORT, port)))?;
        }

        let webhook = config.webhook.clone();
        if !webhook.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "webhook.path must start with '/': {}",
                webhook.path
            )));
        }
        if webhook.fallback_message.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "webhook.fallbackMessage must not be empty".to_string(),
            ));
        }
        if webhook.verify_signature
            && webhook
                .public_url
                .as_deref()
                .and_then(|u| non_empty(u.to_string()))
                .is_none()
        {
            return Err(ConfigError::Invalid(
                "webhook.publicUrl is required when webhook.verifySignature is true".to_string(),
            ));
        }

        let m = &config.messaging;
        let credentials = MessagingCredentials {
            account_sid: env_value(ENV_ACCOUNT_SID)
                .or_else(|| m.account_sid.clone().and_then(non_empty))
                .ok_or(ConfigError::Missing {
                    key: "messaging.accountSid",
                    env: ENV_ACCOUNT_SID,
                })?,
            auth_token: env_value(ENV_AUTH_TOKEN)
                .or_else(|| m.auth_token.clone().and_then(non_empty))
                .ok_or(ConfigError::Missing {
                    key: "messaging.authToken",
                    env: ENV_AUTH_TOKEN,
                })?,
            phone_number: env_value(ENV_PHONE)
                .or_else(|| m.phone_number.clone().and_then(non_empty))
                .ok_or(ConfigError::Missing {
                    key: "messaging.phoneNumber",
                    env: ENV_PHONE,
                })?,
        };
        let messaging = MessagingSettings {
            credentials,
            api_base: m.api_base.clone().and_then(non_empty),
            timeout: Duration::from_secs(m.timeout_secs.max(1)),
        };

        let g = &config.generation;
        let provider = match g.provider {
            Some(p) => p,
            None => infer_provider(&env_value)?,
        };
        let api_key = match provider.key_env() {
            Some(var) => Some(
                env_value(var)
                    .or_else(|| g.api_key.clone().and_then(non_empty))
                    .ok_or(ConfigError::Missing {
                        key: "generation.apiKey",
                        env: var,
                    })?,
            ),
            None => None,
        };
        let generation = GeneratorSettings {
            provider,
            api_key,
            model: g.model.clone().and_then(non_empty),
            base_url: g.base_url.clone().and_then(non_empty),
            timeout: Duration::from_secs(g.timeout_secs.max(1)),
            safety_settings: g.safety_settings.clone(),
        };

        Ok(Self {
            server,
            webhook,
            messaging,
            generation,
        })
    }

    /// One-line description without secrets (for logs and `wa-bridge check`).
    pub fn summary(&self) -> String {
        format!(
            "provider={} model={} mode={} path={} listen={}:{} from=whatsapp:{} verifySignature={}",
            self.generation.provider.as_str(),
            self.generation.model.as_deref().unwrap_or("default"),
            self.webhook.reply_mode.as_str(),
            self.webhook.path,
            self.server.bind,
            self.server.port,
            self.messaging.credentials.phone_number,
            self.webhook.verify_signature,
        )
    }
}

/// No explicit provider: exactly one provider key must be present in the environment.
fn infer_provider(env_value: &dyn Fn(&str) -> Option<String>) -> Result<ProviderKind, ConfigError> {
    let gemini = env_value(ENV_GEMINI_KEY).is_some();
    let huggingface = env_value(ENV_HUGGINGFACE_KEY).is_some();
    match (gemini, huggingface) {
        (true, false) => Ok(ProviderKind::Gemini),
        (false, true) => Ok(ProviderKind::HuggingFace),
        (true, true) => Err(ConfigError::AmbiguousProvider),
        (false, false) => Err(ConfigError::NoProvider),
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
