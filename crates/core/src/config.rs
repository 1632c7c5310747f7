use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub line: LineConfig,
    pub reply: ReplyConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Externally reachable base URL, used to render tenant webhook URLs
    /// in the settings API.
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LineConfig {
    pub api_base: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReplyConfig {
    pub strategy: ReplyStrategyKind,
    pub completion: Option<CompletionConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStrategyKind {
    /// Deterministic substring rules, no external call.
    Keyword,
    /// Delegated completion call with keyword fallback on startup misconfig.
    Ai,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f64,
    /// Upper bound on one completion call; on expiry the generator
    /// degrades to the static apology reply.
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = if let Some(path) = custom_path {
            path
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".doorbot/config.json")
        };

        let s = Config::builder()
            .set_default("server.bind", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://doorbot.db?mode=rwc")?
            .set_default("reply.strategy", "keyword")?
            .add_source(File::from(config_path).required(false))
            // Environment variables (DOORBOT_SERVER__PORT etc.)
            .add_source(Environment::with_prefix("DOORBOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let cfg = AppConfig::load(Some(PathBuf::from("/nonexistent/config.json"))).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.reply.strategy, ReplyStrategyKind::Keyword);
        assert!(cfg.reply.completion.is_none());
        assert!(cfg.line.api_base.is_none());
    }
}
