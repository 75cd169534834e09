use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::context::DEFAULT_MAX_CONTEXT_CHARS;
use crate::dispatch::SamplingParams;
use crate::dispatch::registry::{ApiFormat, ModelEntry};
use crate::document::{DEFAULT_MAX_BYTES, DEFAULT_MAX_PAGES, ExtractLimits};
use crate::gateway::DEFAULT_ATTEMPT_TIMEOUT;

/// Config file looked up in the working directory when `PDF_CHAT_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "pdf-chat.toml";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Candidate order used when neither the config file nor the environment
/// sets one.
pub const DEFAULT_CANDIDATES: &[&str] = &["gemini-2.5-flash", "gemini-2.0-flash", "openai/gpt-5"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Request body ceiling for every route.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub max_bytes: usize,
    pub max_pages: usize,
    pub max_context_chars: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_pages: DEFAULT_MAX_PAGES,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl DocumentConfig {
    pub fn limits(&self) -> ExtractLimits {
        ExtractLimits {
            max_bytes: self.max_bytes,
            max_pages: self.max_pages,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Candidate names in priority order.
    pub candidates: Vec<String>,
    pub attempt_timeout_secs: u64,
    pub sampling: SamplingParams,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
            sampling: SamplingParams::default(),
        }
    }
}

impl GatewayConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// A model declared in the config file's `[[models]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    /// Candidate name used in `gateway.candidates`.
    pub name: String,
    /// Provider-side model id; defaults to `name`.
    pub model_id: Option<String>,
    pub provider: String,
    #[serde(default)]
    pub api_format: ApiFormat,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerConfig,
    document: DocumentConfig,
    gateway: GatewayConfig,
    models: Vec<ModelSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub document: DocumentConfig,
    pub gateway: GatewayConfig,
    pub models: HashMap<String, ModelEntry>,
}

impl Config {
    /// Load from `$PDF_CHAT_CONFIG` (or `./pdf-chat.toml` if present) and the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        let path = env("PDF_CHAT_CONFIG")
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()));

        match path {
            Some(path) => Self::from_file(&path, env),
            None => Self::from_sources(None, env),
        }
    }

    pub fn from_file(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        Self::from_sources(Some(&raw), env)
    }

    /// Build from optional TOML text plus an environment lookup. Environment
    /// values win over the file.
    pub fn from_sources(
        toml_text: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = match toml_text {
            Some(text) => toml::from_str(text)?,
            None => FileConfig::default(),
        };

        let mut server = file.server;
        if let Some(port) = env("PORT") {
            server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {port}")))?;
        }

        let mut gateway = file.gateway;
        if let Some(list) = env("PDF_CHAT_MODELS") {
            gateway.candidates = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        gateway.candidates = dedup_candidates(gateway.candidates);

        let models = build_models(&file.models, &env);

        let config = Config {
            server,
            document: file.document,
            gateway,
            models,
        };
        config.validate()?;
        config.warn_unusable_candidates();
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.gateway
            .sampling
            .validate()
            .map_err(ConfigError::Invalid)?;
        if self.gateway.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "attempt_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.document.max_pages == 0 || self.document.max_context_chars == 0 {
            return Err(ConfigError::Invalid(
                "max_pages and max_context_chars must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Missing credentials are not fatal at startup: the process keeps
    /// serving and requests fail with a config error instead.
    fn warn_unusable_candidates(&self) {
        if self.gateway.candidates.is_empty() {
            tracing::error!("no candidate models configured");
            return;
        }
        for name in &self.gateway.candidates {
            match self.models.get(name) {
                None => tracing::warn!(candidate = %name, "candidate is not a known model"),
                Some(entry) if !entry.is_configured() => tracing::warn!(
                    candidate = %name,
                    provider = %entry.provider,
                    "no API key set, candidate will fail"
                ),
                Some(_) => {}
            }
        }
    }
}

/// Keep the first occurrence of each name so every candidate gets one attempt.
fn dedup_candidates(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(candidates.len());
    for name in candidates {
        if seen.insert(name.clone()) {
            unique.push(name);
        } else {
            tracing::warn!(candidate = %name, "duplicate candidate ignored");
        }
    }
    unique
}

/// Built-in catalog plus models declared in the config file.
fn build_models(
    specs: &[ModelSpec],
    env: &impl Fn(&str) -> Option<String>,
) -> HashMap<String, ModelEntry> {
    let gemini_key = env("GEMINI_API_KEY");
    let openrouter_key = env("OPENROUTER_API_KEY");

    let mut models = HashMap::new();

    // --- Gemini (native API) ---

    for model in ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-2.5-pro"] {
        models.insert(
            model.to_string(),
            ModelEntry {
                model_id: model.to_string(),
                provider: "gemini".to_string(),
                api_format: ApiFormat::Gemini,
                base_url: GEMINI_BASE_URL.to_string(),
                api_key: gemini_key.clone(),
            },
        );
    }

    // --- OpenRouter (OpenAI-compatible) ---

    for model in ["openai/gpt-5", "openai/gpt-4o-mini"] {
        models.insert(
            model.to_string(),
            ModelEntry {
                model_id: model.to_string(),
                provider: "openrouter".to_string(),
                api_format: ApiFormat::OpenAi,
                base_url: OPENROUTER_URL.to_string(),
                api_key: openrouter_key.clone(),
            },
        );
    }

    // --- Declared in config file; override built-ins of the same name ---

    for spec in specs {
        models.insert(
            spec.name.clone(),
            ModelEntry {
                model_id: spec.model_id.clone().unwrap_or_else(|| spec.name.clone()),
                provider: spec.provider.clone(),
                api_format: spec.api_format,
                base_url: spec.base_url.clone(),
                api_key: env(&spec.api_key_env),
            },
        );
    }

    models
}
