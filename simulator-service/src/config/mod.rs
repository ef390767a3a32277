use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::providers::gemini::GEMINI_API_BASE;

const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_PERSISTENCE_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_RELAY_RATE_LIMIT_PER_MINUTE: u32 = 30;
const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 12 * 60 * 60;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub common: core_config::Config,
    pub genai: GenaiConfig,
    /// `None` disables persistence.
    pub mongodb: Option<MongoConfig>,
    pub access: AccessConfig,
    pub relay_rate_limit_per_minute: u32,
    /// Browser sessions and their chats are dropped after this much inactivity.
    pub session_idle_timeout: Duration,
    pub otlp_endpoint: Option<String>,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown GENAI_PROVIDER '{}', expected gemini or mock",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenaiConfig {
    pub provider: ProviderKind,
    /// `None` leaves the relay unconfigured.
    pub api_key: Option<Secret<String>>,
    pub api_base: String,
    pub text_model: String,
    pub temperature: f32,
    pub max_output_tokens: i32,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
    pub write_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub code: Secret<String>,
    pub default_role_label: String,
    pub default_gender_label: String,
}

impl SimulatorConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let mongodb = match optional_env("MONGODB_URI") {
            Some(uri) => Some(MongoConfig {
                uri: Secret::new(uri),
                database: get_env("MONGODB_DATABASE", Some("simulator_db"), is_prod)?,
                write_timeout: Duration::from_millis(parse_env(
                    "PERSISTENCE_TIMEOUT_MS",
                    DEFAULT_PERSISTENCE_TIMEOUT_MS,
                )?),
            }),
            None => None,
        };

        Ok(SimulatorConfig {
            common: common_config,
            genai: GenaiConfig {
                provider: get_env("GENAI_PROVIDER", Some("gemini"), false)?.parse()?,
                api_key: optional_env("GEMINI_API_KEY").map(Secret::new),
                api_base: get_env("GEMINI_API_BASE", Some(GEMINI_API_BASE), false)?,
                text_model: get_env("GENAI_TEXT_MODEL", Some(DEFAULT_TEXT_MODEL), false)?,
                temperature: parse_env("GENAI_TEMPERATURE", 0.7)?,
                max_output_tokens: parse_env("GENAI_MAX_OUTPUT_TOKENS", 2048)?,
            },
            mongodb,
            access: AccessConfig {
                code: Secret::new(get_env("ACCESS_CODE", Some("simulator"), is_prod)?),
                default_role_label: get_env("DEFAULT_ROLE_LABEL", Some("Faculty member"), false)?,
                default_gender_label: get_env("DEFAULT_GENDER_LABEL", Some("neutral"), false)?,
            },
            relay_rate_limit_per_minute: parse_env(
                "RELAY_RATE_LIMIT_PER_MINUTE",
                DEFAULT_RELAY_RATE_LIMIT_PER_MINUTE,
            )?,
            session_idle_timeout: Duration::from_secs(parse_env(
                "SESSION_IDLE_TIMEOUT_SECS",
                DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            )?),
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
        })
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

/// Unset and blank values both count as absent.
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!(" mock ".parse::<ProviderKind>().unwrap(), ProviderKind::Mock);
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn missing_optional_values_fall_back() {
        assert_eq!(
            parse_env("SIMULATOR_TEST_UNSET_NUMBER", 42u32).unwrap(),
            42
        );
        assert!(optional_env("SIMULATOR_TEST_UNSET_VALUE").is_none());
        assert_eq!(
            get_env("SIMULATOR_TEST_UNSET_VALUE", Some("x"), false).unwrap(),
            "x"
        );
        assert!(get_env("SIMULATOR_TEST_UNSET_VALUE", Some("x"), true).is_err());
        assert!(get_env("SIMULATOR_TEST_UNSET_VALUE", None, false).is_err());
    }
}
