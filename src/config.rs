use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::EngineError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KencotConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    pub learning: LearningConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite`, `json`, or `memory`.
    pub backend: String,
    pub db_path: String,
    pub json_path: String,
    pub catalog_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local` (ONNX model with degraded fallbacks), `vocabulary`, or `hash`.
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    pub dimension: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub oversample_factor: usize,
    pub favorite_boost: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_minutes: i64,
    pub max_history: usize,
    pub max_recommendations: u32,
    pub cooldown_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LearningConfig {
    pub budget_ceiling_ratio: f64,
    pub hunger_pattern_limit: usize,
}

impl Default for KencotConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 7433,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_kencot_dir();
        Self {
            backend: "sqlite".into(),
            db_path: dir.join("kencot.db").to_string_lossy().into_owned(),
            json_path: dir.join("profiles.json").to_string_lossy().into_owned(),
            catalog_path: dir.join("catalog.json").to_string_lossy().into_owned(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_kencot_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            dimension: crate::embedding::EMBEDDING_DIM,
            timeout_ms: 2000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            similarity_threshold: 0.3,
            oversample_factor: 2,
            favorite_boost: 0.15,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            max_history: 10,
            max_recommendations: 5,
            cooldown_minutes: 10,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            budget_ceiling_ratio: 1.2,
            hunger_pattern_limit: 20,
        }
    }
}

/// Returns `~/.kencot/`
pub fn default_kencot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kencot")
}

/// Returns the default config file path: `~/.kencot/config.toml`
pub fn default_config_path() -> PathBuf {
    default_kencot_dir().join("config.toml")
}

impl KencotConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, apply env var overrides, then validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            KencotConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("KENCOT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("KENCOT_CATALOG") {
            self.storage.catalog_path = val;
        }
        if let Ok(val) = std::env::var("KENCOT_STORAGE") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("KENCOT_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Ok(val) = std::env::var("KENCOT_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.embedding.dimension == 0 {
            return Err(EngineError::Configuration(
                "embedding.dimension must be greater than zero".into(),
            ));
        }
        match self.embedding.provider.as_str() {
            "local" => {
                if self.embedding.dimension != crate::embedding::EMBEDDING_DIM {
                    return Err(EngineError::Configuration(format!(
                        "embedding.dimension {} does not match {} output ({})",
                        self.embedding.dimension,
                        self.embedding.model,
                        crate::embedding::EMBEDDING_DIM
                    )));
                }
            }
            "vocabulary" | "hash" => {}
            other => {
                return Err(EngineError::Configuration(format!(
                    "unknown embedding provider: {other}. Supported: local, vocabulary, hash"
                )))
            }
        }
        match self.storage.backend.as_str() {
            "sqlite" | "json" | "memory" => {}
            other => {
                return Err(EngineError::Configuration(format!(
                    "unknown storage backend: {other}. Supported: sqlite, json, memory"
                )))
            }
        }
        if !(-1.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(EngineError::Configuration(
                "retrieval.similarity_threshold must be within [-1, 1]".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(EngineError::Configuration("retrieval.top_k must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_json_path(&self) -> PathBuf {
        expand_tilde(&self.storage.json_path)
    }

    pub fn resolved_catalog_path(&self) -> PathBuf {
        expand_tilde(&self.storage.catalog_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = KencotConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.learning.hunger_pattern_limit, 20);
        assert!(config.storage.db_path.ends_with("kencot.db"));
        config.validate().unwrap();
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
backend = "json"
json_path = "/tmp/profiles.json"

[retrieval]
top_k = 2
similarity_threshold = 0.5
"#;
        let config: KencotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.backend, "json");
        assert_eq!(config.storage.json_path, "/tmp/profiles.json");
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.retrieval.similarity_threshold, 0.5);
        // defaults still apply for unset fields
        assert_eq!(config.retrieval.oversample_factor, 2);
        assert_eq!(config.session.max_recommendations, 5);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = KencotConfig::default();
        std::env::set_var("KENCOT_DB", "/tmp/override.db");
        std::env::set_var("KENCOT_CATALOG", "/tmp/catalog.json");
        std::env::set_var("KENCOT_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.storage.catalog_path, "/tmp/catalog.json");
        assert_eq!(config.server.log_level, "trace");

        // Clean up
        std::env::remove_var("KENCOT_DB");
        std::env::remove_var("KENCOT_CATALOG");
        std::env::remove_var("KENCOT_LOG_LEVEL");
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let mut config = KencotConfig::default();
        config.embedding.provider = "hash".into();
        config.embedding.dimension = 0;
        assert!(matches!(config.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn local_provider_requires_model_dimension() {
        let mut config = KencotConfig::default();
        config.embedding.dimension = 192;
        assert!(config.validate().is_err());

        config.embedding.provider = "vocabulary".into();
        config.validate().unwrap();
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = KencotConfig::default();
        config.storage.backend = "mongo".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown storage backend"));
    }
}
