//! Configuration system for noesis.
//!
//! Every component receives its section of [`NoesisConfig`] through its
//! constructor; there is no process-wide configuration holder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cognitive::{DecaySchedulerConfig, RankAccumulation, ReviewIntervalPolicy};
use crate::error::{NoesisError, NoesisResult};
use crate::traits::{EmbedderConfig, LlmConfig};

/// Weight decay model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Base decay rate applied to sqrt(days elapsed).
    pub decay_lambda: f64,
    /// Scale of the interaction boost.
    pub beta_coefficient: f64,
    /// Scale of the time-decay term.
    pub alpha: f64,
    /// Amplitude of the annual oscillation of the decay rate.
    pub seasonal_amplitude: f64,
    /// Base weight given to a newly observed document.
    pub initial_weight: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            decay_lambda: 0.05,
            beta_coefficient: 0.1,
            alpha: 1.0,
            seasonal_amplitude: 0.01,
            initial_weight: 0.5,
        }
    }
}

/// Review scheduling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Upper bound for a review interval, in days.
    pub max_review_interval: u32,
    /// Interval formula used when a review advances the next review date.
    pub interval_policy: ReviewIntervalPolicy,
    /// Maximum number of due files returned per selection.
    pub max_review_batch: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_review_interval: 30,
            interval_policy: ReviewIntervalPolicy::Linear,
            max_review_batch: 20,
        }
    }
}

/// Link discovery parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Inferred links are accepted only above this confidence.
    pub confidence_threshold: f64,
    /// Maximum number of candidate neighbours sent for inference.
    pub max_candidates: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            max_candidates: 50,
        }
    }
}

/// Centrality computation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityConfig {
    pub damping_factor: f64,
    pub iterations: usize,
    pub accumulation: RankAccumulation,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            iterations: 10,
            accumulation: RankAccumulation::Reset,
        }
    }
}

/// Question generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionConfig {
    /// Retries after the first failed attempt.
    pub max_retries: usize,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Document text beyond this many characters is not sent.
    pub max_content_chars: usize,
}

impl Default for QuestionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            max_content_chars: 4000,
        }
    }
}

/// Main noesis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoesisConfig {
    pub weight: WeightConfig,
    pub review: ReviewConfig,
    pub links: LinkConfig,
    pub centrality: CentralityConfig,
    pub questions: QuestionConfig,
    pub scheduler: DecaySchedulerConfig,
    pub llm: LlmConfig,
    pub embedder: EmbedderConfig,
    /// Path to the SQLite state database.
    pub store_path: PathBuf,
}

impl Default for NoesisConfig {
    fn default() -> Self {
        Self {
            weight: WeightConfig::default(),
            review: ReviewConfig::default(),
            links: LinkConfig::default(),
            centrality: CentralityConfig::default(),
            questions: QuestionConfig::default(),
            scheduler: DecaySchedulerConfig::default(),
            llm: LlmConfig::default(),
            embedder: EmbedderConfig::default(),
            store_path: default_data_dir().join("state.db"),
        }
    }
}

/// Default data directory (`~/.noesis`).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".noesis"))
        .unwrap_or_else(|| PathBuf::from(".noesis"))
}

impl NoesisConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> NoesisResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| NoesisError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| NoesisError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| NoesisError::Configuration(e.to_string()))?,
            _ => {
                return Err(NoesisError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `NOESIS_DECAY_LAMBDA`, `NOESIS_BETA_COEFFICIENT`, `NOESIS_ALPHA`
    /// - `NOESIS_INTERVAL_POLICY` (`linear` or `exponential`)
    /// - `NOESIS_MAX_REVIEW_BATCH`, `NOESIS_MAX_REVIEW_INTERVAL`
    /// - `NOESIS_LLM_MODEL`, `NOESIS_LLM_BASE_URL`, `NOESIS_EMBEDDING_MODEL`
    /// - `NOESIS_EMBEDDING_BASE_URL` (defaults to the LLM base URL)
    /// - `OPENAI_API_KEY`
    /// - `NOESIS_STORE_PATH`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("NOESIS_DECAY_LAMBDA") {
            config.weight.decay_lambda = v;
        }
        if let Some(v) = env_parse("NOESIS_BETA_COEFFICIENT") {
            config.weight.beta_coefficient = v;
        }
        if let Some(v) = env_parse("NOESIS_ALPHA") {
            config.weight.alpha = v;
        }
        if let Ok(policy) = std::env::var("NOESIS_INTERVAL_POLICY") {
            if let Ok(policy) = policy.parse() {
                config.review.interval_policy = policy;
            }
        }
        if let Some(v) = env_parse("NOESIS_MAX_REVIEW_BATCH") {
            config.review.max_review_batch = v;
        }
        if let Some(v) = env_parse("NOESIS_MAX_REVIEW_INTERVAL") {
            config.review.max_review_interval = v;
        }

        if let Ok(model) = std::env::var("NOESIS_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(base_url) = std::env::var("NOESIS_LLM_BASE_URL") {
            config.llm.base_url = Some(base_url.clone());
            config.embedder.base_url = Some(base_url);
        }
        if let Ok(base_url) = std::env::var("NOESIS_EMBEDDING_BASE_URL") {
            config.embedder.base_url = Some(base_url);
        }
        if let Ok(model) = std::env::var("NOESIS_EMBEDDING_MODEL") {
            config.embedder.model = model;
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            config.llm.api_key = Some(api_key.clone());
            config.embedder.api_key = Some(api_key);
        }

        if let Ok(path) = std::env::var("NOESIS_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }

        config
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> NoesisResult<()> {
        if !(0.0..1.0).contains(&self.centrality.damping_factor) {
            return Err(NoesisError::validation_with_suggestion(
                format!(
                    "damping_factor must be in [0, 1), got {}",
                    self.centrality.damping_factor
                ),
                "The conventional value is 0.85",
            ));
        }
        if !(0.0..=1.0).contains(&self.weight.initial_weight) {
            return Err(NoesisError::validation(format!(
                "initial_weight must be in [0, 1], got {}",
                self.weight.initial_weight
            )));
        }
        if self.review.max_review_interval == 0 {
            return Err(NoesisError::validation(
                "max_review_interval must be at least 1 day",
            ));
        }
        if !(0.0..=1.0).contains(&self.links.confidence_threshold) {
            return Err(NoesisError::validation(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.links.confidence_threshold
            )));
        }
        Ok(())
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> NoesisConfigBuilder {
        NoesisConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Builder for NoesisConfig.
#[derive(Default)]
pub struct NoesisConfigBuilder {
    config: NoesisConfig,
}

impl NoesisConfigBuilder {
    /// Set weight model parameters.
    pub fn weight(mut self, config: WeightConfig) -> Self {
        self.config.weight = config;
        self
    }

    /// Set review scheduling parameters.
    pub fn review(mut self, config: ReviewConfig) -> Self {
        self.config.review = config;
        self
    }

    /// Set link discovery parameters.
    pub fn links(mut self, config: LinkConfig) -> Self {
        self.config.links = config;
        self
    }

    /// Set centrality parameters.
    pub fn centrality(mut self, config: CentralityConfig) -> Self {
        self.config.centrality = config;
        self
    }

    /// Set question generation parameters.
    pub fn questions(mut self, config: QuestionConfig) -> Self {
        self.config.questions = config;
        self
    }

    /// Set decay scheduler parameters.
    pub fn scheduler(mut self, config: DecaySchedulerConfig) -> Self {
        self.config.scheduler = config;
        self
    }

    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmConfig) -> Self {
        self.config.llm = config;
        self
    }

    /// Set embedder configuration.
    pub fn embedder(mut self, config: EmbedderConfig) -> Self {
        self.config.embedder = config;
        self
    }

    /// Set the state database path.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> NoesisResult<NoesisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NoesisConfig::default();
        assert_eq!(config.weight.decay_lambda, 0.05);
        assert_eq!(config.centrality.damping_factor, 0.85);
        assert_eq!(config.centrality.iterations, 10);
        assert_eq!(config.links.max_candidates, 50);
        assert_eq!(config.review.interval_policy, ReviewIntervalPolicy::Linear);
        assert_eq!(config.questions.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validates() {
        let err = NoesisConfig::builder()
            .centrality(CentralityConfig {
                damping_factor: 1.5,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("damping_factor"));
    }

    #[test]
    fn test_from_toml_file_partial() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[weight]\ndecay_lambda = 0.2\n\n[review]\ninterval_policy = \"exponential\""
        )
        .unwrap();

        let config = NoesisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.weight.decay_lambda, 0.2);
        assert_eq!(config.weight.alpha, 1.0);
        assert_eq!(
            config.review.interval_policy,
            ReviewIntervalPolicy::Exponential
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            NoesisConfig::from_file(file.path()),
            Err(NoesisError::Configuration(_))
        ));
    }
}
