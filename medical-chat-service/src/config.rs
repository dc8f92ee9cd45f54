use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Configuration for the chat service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,

    pub gemini_api_key: String,
    /// Gemini model used for every gateway mode
    pub gemini_model: String,
    /// Upper bound for a single gateway call
    pub gateway_timeout: Duration,

    /// Google Custom Search credentials. Without them image lookups fail and
    /// the placeholder URLs are served instead.
    pub google_search_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,

    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid number for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env if present
        let _ = dotenvy::dotenv();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingVar("GEMINI_API_KEY"))?;

        Ok(Self {
            host: env_or_default("HOST", "0.0.0.0"),
            port: parse_or_default::<u16>("PORT", 3000)?,
            gemini_api_key,
            gemini_model: env_or_default("GEMINI_MODEL", "gemini-1.5-flash"),
            gateway_timeout: Duration::from_secs(parse_or_default::<u64>(
                "GATEWAY_TIMEOUT_SECS",
                60,
            )?),
            google_search_api_key: env_optional("GOOGLE_SEARCH_API_KEY"),
            google_search_engine_id: env_optional("GOOGLE_SEARCH_ENGINE_ID"),
            template_dir: PathBuf::from(env_or_default("TEMPLATE_DIR", "templates")),
            static_dir: PathBuf::from(env_or_default("STATIC_DIR", "static")),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or_default(key: &'static str, default: &'static str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_optional(key: &'static str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or_default<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            name: key,
            value: v,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        let config = ServiceConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            gemini_api_key: "key".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            gateway_timeout: Duration::from_secs(5),
            google_search_api_key: None,
            google_search_engine_id: None,
            template_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_or_default_falls_back_when_unset() {
        let port = parse_or_default::<u16>("MEDICAL_CHAT_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(port, 3000);
    }
}
