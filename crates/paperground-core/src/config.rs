//! Pipeline configuration and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` +
//! `PAPERGROUND_*` env vars into a typed [`PipelineConfig`]. Every policy
//! knob the pipeline leaves open (fusion scheme, similarity floor, token
//! budget, retry curve) lives here rather than being hard-coded.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::Error;

/// How dense and sparse rankings are combined per query variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum FusionScheme {
    /// Weighted sum of min-max normalized scores; `dense_weight` in
    /// [0, 1], sparse gets the complement.
    Linear { dense_weight: f32 },
    /// Reciprocal-rank fusion with smoothing constant `k`.
    ReciprocalRank { k: u32 },
}

impl Default for FusionScheme {
    fn default() -> Self {
        Self::ReciprocalRank { k: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub fusion: FusionScheme,
    /// Fused scores are normalized to [0, 1]; candidates below this are
    /// discarded even when nothing better exists.
    pub similarity_floor: f32,
    /// Paraphrase variants requested from the enhancer, on top of the
    /// original query.
    pub query_variants: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fusion: FusionScheme::default(),
            similarity_floor: 0.05,
            query_variants: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Marginal-relevance scores within this distance count as a near
    /// tie, where document novelty breaks the tie.
    pub tie_epsilon: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { tie_epsilon: 0.02 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Hard ceiling on context size in model tokens.
    pub token_budget: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: 18_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Per-attempt timeout for external calls.
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub selection: SelectionConfig,
    pub context: ContextConfig,
    pub retry: RetryConfig,
}

impl PipelineConfig {
    /// Merge defaults, `config.toml`, the `RUST_ENV` override file and
    /// `PAPERGROUND_*` env vars (nested keys split on `__`).
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("PAPERGROUND_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.retrieval.similarity_floor) {
            return Err(Error::InvalidConfig(
                "retrieval.similarity_floor must be in [0, 1]".to_string(),
            ));
        }
        if let FusionScheme::Linear { dense_weight } = self.retrieval.fusion {
            if !(0.0..=1.0).contains(&dense_weight) {
                return Err(Error::InvalidConfig(
                    "retrieval.fusion.dense_weight must be in [0, 1]".to_string(),
                ));
            }
        }
        if self.context.token_budget == 0 {
            return Err(Error::InvalidConfig(
                "context.token_budget must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
