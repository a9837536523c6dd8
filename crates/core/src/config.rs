//! Configuration management for the Diligence research agent.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Config files (.diligence/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Precedence is defaults < YAML < environment < CLI flags. Everything the
//! pipeline needs is validated up front by [`AppConfig::validate`] so that
//! configuration problems fail fast at startup instead of mid-query.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .diligence/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generation provider (e.g., "ollama", "openai")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// API key for the generation provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Explicit corpus file (JSONL fragments)
    pub corpus_path: Option<PathBuf>,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Embedding service settings
    pub embedding: EmbeddingSettings,

    /// Retrieval and workflow tuning
    pub pipeline: PipelineConfig,

    /// Reranker strategy settings
    pub reranker: RerankerSettings,

    /// Bias mitigation policy
    pub bias: BiasSettings,

    /// Backoff policy for model service calls
    pub retry: RetrySettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        #[serde(rename = "organizationEnv")]
        organization_env: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" (offline) or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Optional endpoint override
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Retrieval and workflow tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Weight of the semantic score in the fused score (0.0 - 1.0)
    pub fusion_alpha: f32,

    /// Candidates returned by each hybrid search call
    pub retrieval_top_k: usize,

    /// Candidates kept by the global rerank pass
    pub rerank_top_k: usize,

    /// Candidates kept by each per-category rerank
    pub candidate_rerank_top_k: usize,

    /// Maximum fragments handed to the synthesizer
    pub evidence_size: usize,

    /// Maximum number of reject -> replan cycles
    pub max_iterations: u32,

    /// Number of sub-queries the planner is asked for
    pub target_sub_query_count: usize,

    /// Concurrent retrieval branches per Retrieve stage
    pub retrieval_concurrency: usize,

    /// Rerank the aggregated pool against the original query
    pub global_rerank: bool,

    /// Document categories searched for every sub-query
    pub categories: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fusion_alpha: 0.7,
            retrieval_top_k: 20,
            rerank_top_k: 5,
            candidate_rerank_top_k: 10,
            evidence_size: 10,
            max_iterations: 2,
            target_sub_query_count: 5,
            retrieval_concurrency: 4,
            global_rerank: true,
            categories: vec![
                "10-K".to_string(),
                "10-Q".to_string(),
                "news".to_string(),
                "wikipedia".to_string(),
            ],
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.fusion_alpha) {
            return Err(AppError::Config(format!(
                "pipeline.fusionAlpha must be within [0, 1], got {}",
                self.fusion_alpha
            )));
        }

        let counts = [
            ("retrievalTopK", self.retrieval_top_k),
            ("rerankTopK", self.rerank_top_k),
            ("candidateRerankTopK", self.candidate_rerank_top_k),
            ("evidenceSize", self.evidence_size),
            ("targetSubQueryCount", self.target_sub_query_count),
            ("retrievalConcurrency", self.retrieval_concurrency),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "pipeline.{} must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Reranking strategy selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RerankStrategy {
    /// Ask the generation model for an ordering of candidate indices
    #[default]
    Listwise,
    /// Score each pair with a dedicated relevance model
    Pointwise,
    /// Keep retrieval order
    None,
}

/// Reranker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RerankerSettings {
    pub strategy: RerankStrategy,

    /// Relevance-scoring service endpoint (pointwise strategy)
    pub endpoint: Option<String>,

    /// Characters of each candidate shown to the listwise ranker
    pub snippet_chars: usize,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::Listwise,
            endpoint: None,
            snippet_chars: 300,
        }
    }
}

/// Per-group bias policy overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupSettings {
    /// Group-specific floor, defaults to the global threshold
    pub min_score: Option<f32>,

    /// Average score observed in past runs; replaces the live average
    pub historical_average: Option<f32>,
}

/// Bias mitigation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BiasSettings {
    /// Groups whose average falls below this floor get boosted
    pub min_score_threshold: f32,

    /// Multiplicative boost (> 1.0), results capped at 1.0
    pub boost_factor: f32,

    /// Tracked groups (tickers, entities, demographic tags)
    pub groups: BTreeMap<String, GroupSettings>,
}

impl Default for BiasSettings {
    fn default() -> Self {
        Self {
            min_score_threshold: 0.60,
            boost_factor: 1.05,
            groups: BTreeMap::new(),
        }
    }
}

impl BiasSettings {
    fn validate(&self) -> AppResult<()> {
        if self.boost_factor <= 1.0 {
            return Err(AppError::Config(format!(
                "bias.boostFactor must be greater than 1.0, got {}",
                self.boost_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.min_score_threshold) {
            return Err(AppError::Config(format!(
                "bias.minScoreThreshold must be within [0, 1], got {}",
                self.min_score_threshold
            )));
        }
        Ok(())
    }
}

/// Exponential backoff settings for rate-limited services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 5_000,
            max_delay_ms: 60_000,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    embedding: Option<EmbeddingSettings>,
    pipeline: Option<PipelineConfig>,
    reranker: Option<RerankerSettings>,
    bias: Option<BiasSettings>,
    retry: Option<RetrySettings>,
    corpus: Option<CorpusConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CorpusConfig {
    path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            corpus_path: None,
            llm: None,
            embedding: EmbeddingSettings::default(),
            pipeline: PipelineConfig::default(),
            reranker: RerankerSettings::default(),
            bias: BiasSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `DILIGENCE_WORKSPACE`: Override workspace path
    /// - `DILIGENCE_CONFIG`: Path to config file
    /// - `DILIGENCE_PROVIDER`: Generation provider
    /// - `DILIGENCE_MODEL`: Model identifier
    /// - `DILIGENCE_API_KEY`: API key
    /// - `DILIGENCE_CORPUS`: Corpus JSONL file
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use diligence_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `DILIGENCE_WORKSPACE` and `DILIGENCE_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var("DILIGENCE_WORKSPACE").ok().map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("DILIGENCE_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".diligence/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DILIGENCE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DILIGENCE_MODEL") {
            config.model = model;
        }

        if let Ok(corpus) = std::env::var("DILIGENCE_CORPUS") {
            config.corpus_path = Some(PathBuf::from(corpus));
        }

        config.api_key = std::env::var("DILIGENCE_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::OpenAI { model, .. } => model.clone(),
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                };
            }

            result.llm = Some(llm);
        }

        if let Some(corpus) = config_file.corpus {
            if let Some(path) = corpus.path {
                result.corpus_path = Some(PathBuf::from(path));
            }
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }
        if let Some(reranker) = config_file.reranker {
            result.reranker = reranker;
        }
        if let Some(bias) = config_file.bias {
            result.bias = bias;
        }
        if let Some(retry) = config_file.retry {
            result.retry = retry;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and YAML.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        corpus: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(corpus) = corpus {
            self.corpus_path = Some(corpus);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .diligence directory.
    pub fn diligence_dir(&self) -> PathBuf {
        self.workspace.join(".diligence")
    }

    /// Corpus file location, defaulting to `.diligence/corpus.jsonl`.
    pub fn corpus_path(&self) -> PathBuf {
        match &self.corpus_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.workspace.join(path),
            None => self.diligence_dir().join("corpus.jsonl"),
        }
    }

    /// Get the configuration of a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Resolve the endpoint configured for a provider, if any.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        match self.get_provider_config(provider)? {
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint),
            ProviderConfig::OpenAI { endpoint, .. } => endpoint,
        }
    }

    /// Resolve API key from environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        // Explicit DILIGENCE_API_KEY wins
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider)? {
            ProviderConfig::OpenAI { api_key_env, .. } => std::env::var(api_key_env).ok(),
            ProviderConfig::Ollama { .. } => None,
        }
    }

    /// Validate configuration for the active provider and the pipeline.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama", "openai"];
        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if self.provider == "openai" && self.resolve_api_key(&self.provider).is_none() {
            let hint = match self.get_provider_config(&self.provider) {
                Some(ProviderConfig::OpenAI { api_key_env, .. }) => api_key_env,
                _ => "DILIGENCE_API_KEY".to_string(),
            };
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                hint
            )));
        }

        let known_embedders = ["trigram", "ollama"];
        if !known_embedders.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_embedders.join(", ")
            )));
        }
        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.reranker.strategy == RerankStrategy::Pointwise && self.reranker.endpoint.is_none()
        {
            return Err(AppError::Config(
                "reranker.endpoint is required for the pointwise strategy".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }

        self.pipeline.validate()?;
        self.bias.validate()?;

        Ok(())
    }
}
