use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::middleware::rate_limit::RateLimitStrategy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ALLOWED_ORIGIN: &str = "https://comfyworkspace.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo-instruct";

#[derive(Debug, Clone)]
pub struct BlogConfig {
    pub common: core_config::Config,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// The single browser origin allowed to call the API.
    pub allowed_origin: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_seconds: u64,
    pub strategy: RateLimitStrategy,
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    fn validate(self) -> Result<Self, AppError> {
        if self.requests == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "RATE_LIMIT_REQUESTS must be at least 1"
            )));
        }
        if self.window_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "RATE_LIMIT_WINDOW_SECONDS must be at least 1"
            )));
        }
        Ok(self)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 5,
            window_seconds: 60,
            strategy: RateLimitStrategy::FixedWindow,
            trust_forwarded_for: false,
        }
    }
}

/// Which text generation backend serves `/generate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    /// Canned responses, for local runs without a credential.
    Mock,
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(ProviderKind::OpenAi),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown generator provider '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Missing keys are not a startup error; generation calls fail instead.
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout_seconds: 120,
        }
    }
}

impl BlogConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(BlogConfig {
            common: common_config,
            cors: CorsConfig {
                allowed_origin: get_env("CORS_ALLOWED_ORIGIN", Some(DEFAULT_ALLOWED_ORIGIN), is_prod)?,
            },
            rate_limit: RateLimitConfig {
                requests: parse_env("RATE_LIMIT_REQUESTS", 5)?,
                window_seconds: parse_env("RATE_LIMIT_WINDOW_SECONDS", 60)?,
                strategy: parse_env("RATE_LIMIT_STRATEGY", RateLimitStrategy::FixedWindow)?,
                trust_forwarded_for: parse_env("RATE_LIMIT_TRUST_FORWARDED_FOR", false)?,
            }
            .validate()?,
            provider: ProviderConfig {
                kind: parse_env("GENERATOR_PROVIDER", ProviderKind::OpenAi)?,
                api_key: env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .map(Secret::new),
                base_url: get_env("OPENAI_BASE_URL", Some(DEFAULT_OPENAI_BASE_URL), false)?,
                model: get_env("OPENAI_MODEL", Some(DEFAULT_OPENAI_MODEL), false)?,
                timeout_seconds: parse_env("OPENAI_TIMEOUT_SECONDS", 120)?,
            },
        })
    }

    /// Built-in defaults with port 0 and no credential, bypassing the environment.
    pub fn for_tests() -> Self {
        BlogConfig {
            common: core_config::Config {
                port: 0,
                ..core_config::Config::default()
            },
            cors: CorsConfig {
                allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            },
            rate_limit: RateLimitConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}
