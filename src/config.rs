use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Severity;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub insights: InsightConfig,
}

/// Fusion knobs for hybrid search.
///
/// `alpha` and `convergence_boost` jointly determine ranking: `alpha` weighs
/// the vector channel against the keyword channel, and the boost is added on
/// top when a chunk surfaces in both. Tune them together: changing one
/// without the other silently alters relevance order.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Weight of the vector score in `alpha·vector + (1−alpha)·keyword`.
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Added to the fused score when a chunk matches both channels.
    #[serde(default = "default_convergence_boost")]
    pub convergence_boost: f32,
    /// Vector candidates kept before fusion. 0 means the whole index, which
    /// is the right default for small corpora.
    #[serde(default)]
    pub candidate_k: usize,
    /// Default result count when the caller does not pass a limit.
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    /// Degrade to keyword-only results when the embedding provider fails,
    /// instead of failing closed.
    #[serde(default)]
    pub keyword_fallback: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            convergence_boost: default_convergence_boost(),
            candidate_k: 0,
            final_limit: default_final_limit(),
            keyword_fallback: false,
        }
    }
}

fn default_alpha() -> f32 {
    0.5
}
fn default_convergence_boost() -> f32 {
    0.15
}
fn default_final_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"disabled"`, `"hash"` (offline, deterministic), or `"openai"`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_api_base_openai")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            api_base: default_api_base_openai(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// `"disabled"`, `"rule"` (offline heuristics), or `"chat"` (an
    /// OpenAI-compatible chat-completions endpoint).
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_extraction_model")]
    pub model: String,
    #[serde(default = "default_api_base_groq")]
    pub api_base: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_extraction_model(),
            api_base: default_api_base_groq(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ExtractionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Thresholds for the intelligence layer.
#[derive(Debug, Deserialize, Clone)]
pub struct InsightConfig {
    /// Centrality percentile at or above which a node counts as a core
    /// concept. Default: top decile.
    #[serde(default = "default_centrality_percentile")]
    pub centrality_percentile: f32,
    /// Object confidence at or above which an endpoint counts as
    /// well-evidenced for contradiction severity.
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f32,
    /// Severity assigned to stale-thread insights.
    #[serde(default = "default_stale_severity")]
    pub stale_severity: Severity,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            centrality_percentile: default_centrality_percentile(),
            high_confidence: default_high_confidence(),
            stale_severity: default_stale_severity(),
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_api_base_openai() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_base_groq() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_extraction_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_centrality_percentile() -> f32 {
    0.9
}
fn default_high_confidence() -> f32 {
    0.7
}
fn default_stale_severity() -> Severity {
    Severity::Medium
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.retrieval.alpha) {
        return Err(Error::Config(
            "retrieval.alpha must be in [0.0, 1.0]".to_string(),
        ));
    }

    if config.retrieval.convergence_boost < 0.0 {
        return Err(Error::Config(
            "retrieval.convergence_boost must be >= 0".to_string(),
        ));
    }

    if config.retrieval.final_limit == 0 {
        return Err(Error::Config(
            "retrieval.final_limit must be >= 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.insights.centrality_percentile)
        || config.insights.centrality_percentile == 0.0
    {
        return Err(Error::Config(
            "insights.centrality_percentile must be in (0.0, 1.0]".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.insights.high_confidence) {
        return Err(Error::Config(
            "insights.high_confidence must be in [0.0, 1.0]".to_string(),
        ));
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "openai" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown embedding provider: '{other}'. Must be disabled, hash, or openai."
            )))
        }
    }

    if config.embedding.is_enabled() && config.embedding.dims.unwrap_or(0) == 0 {
        return Err(Error::Config(format!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        )));
    }

    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        return Err(Error::Config(
            "embedding.model must be specified for the openai provider".to_string(),
        ));
    }

    match config.extraction.provider.as_str() {
        "disabled" | "rule" | "chat" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown extraction provider: '{other}'. Must be disabled, rule, or chat."
            )))
        }
    }

    Ok(())
}
