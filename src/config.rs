//! Application configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::assessment::ScoreWeights;
use crate::orchestrator::{AdapterConfig, OrchestratorConfig};

pub const DEFAULT_SPEECH_LANGUAGE: &str = "en-US";
pub const DEFAULT_GRADER_URL: &str = "http://localhost:11434";
pub const DEFAULT_GRADER_MODEL: &str = "phi4";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration `{key}`")]
    Missing { key: String },
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("score weights must be finite, non-negative and not both zero")]
    InvalidWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechProviderConfig {
    pub subscription_key: String,
    pub region: String,
    pub language: String,
    /// Overrides the regional endpoint, mostly for testing against a stub.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl SpeechProviderConfig {
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
                self.region
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRADER_URL.to_string(),
            model: DEFAULT_GRADER_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub level: String,
    pub json: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub speech: SpeechProviderConfig,
    pub grader: GraderConfig,
    pub orchestrator: OrchestratorConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Reads `.env` when present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(target: "config", path = %path.display(), "loaded .env file"),
            Err(err) => debug!(target: "config", %err, "no .env file loaded"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let speech = SpeechProviderConfig {
            subscription_key: env.required("AZURE_SPEECH_KEY")?,
            region: env.required("AZURE_SPEECH_REGION")?,
            language: env
                .optional("AZURE_SPEECH_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_SPEECH_LANGUAGE.to_string()),
            endpoint: env.optional("AZURE_SPEECH_ENDPOINT"),
        };

        let defaults = GraderConfig::default();
        let grader = GraderConfig {
            base_url: env
                .optional("GRADER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: env.optional("GRADER_MODEL").unwrap_or(defaults.model),
            ..defaults
        };

        let weights = ScoreWeights {
            speech: env.parsed("ASSESSMENT_SPEECH_WEIGHT")?.unwrap_or(0.5),
            content: env.parsed("ASSESSMENT_CONTENT_WEIGHT")?.unwrap_or(0.5),
        };
        if !weights.is_valid() {
            return Err(ConfigError::InvalidWeights);
        }

        let mut speech_adapter = AdapterConfig::speech();
        let mut content_adapter = AdapterConfig::grader();
        if let Some(retries) = env.parsed::<u32>("ASSESSMENT_MAX_RETRIES")? {
            speech_adapter.max_retries = retries;
            content_adapter.max_retries = retries;
        }
        if let Some(backoff) = env.parsed::<u64>("ASSESSMENT_BACKOFF_MS")? {
            speech_adapter.base_backoff = Duration::from_millis(backoff);
            content_adapter.base_backoff = Duration::from_millis(backoff);
        }
        if let Some(timeout) = env.parsed::<u64>("SPEECH_TIMEOUT_MS")? {
            speech_adapter.timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = env.parsed::<u64>("GRADER_TIMEOUT_MS")? {
            content_adapter.timeout = Duration::from_millis(timeout);
        }

        let telemetry = TelemetryConfig {
            level: env
                .optional("LOG_LEVEL")
                .map(|level| level.to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            json: env.parsed("LOG_JSON")?.unwrap_or(false),
            log_dir: env.optional("LOG_DIR").map(PathBuf::from),
        };

        Ok(Self {
            speech,
            grader,
            orchestrator: OrchestratorConfig {
                weights,
                speech: speech_adapter,
                content: content_adapter,
            },
            telemetry,
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::Missing {
            key: key.to_string(),
        })
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|value| {
                value.parse::<T>().map_err(|err| ConfigError::Invalid {
                    key: key.to_string(),
                    value: value.clone(),
                    reason: err.to_string(),
                })
            })
            .transpose()
    }
}
