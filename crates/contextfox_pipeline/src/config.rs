//! Layered configuration.
//!
//! Loads configuration with precedence:
//! - Bundled defaults (include_str! from contextfox.toml)
//! - User overrides (~/.config/contextfox/contextfox.toml, then ./contextfox.toml)

use crate::prompts::{PromptSet, PromptTemplate};
use crate::retry::RetryPolicy;
use crate::splitting::DEFAULT_SPLIT_THRESHOLD;
use config::{Config, File, FileFormat};
use contextfox_core::{ModelChoice, ModelParams, TaskKind};
use contextfox_error::{ConfigError, ContextFoxError, ContextFoxResult};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../contextfox.toml");

/// Completion API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct ApiConfig {
    /// API root
    base_url: String,
    /// Environment variable holding the API key
    api_key_env: String,
    /// Whole-request timeout
    timeout_secs: u64,
    /// First backoff after a 429 or 503
    backoff_ms: u64,
    /// Backoff retries after a 429 or 503
    backoff_retries: usize,
    /// Longest backoff delay
    max_delay_secs: u64,
}

/// Pipeline behaviour switches.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct ProcessingConfig {
    /// Stop after each part until resumed
    #[serde(default)]
    require_permission_between_parts: bool,
    /// Attempts per task, refusal retries included
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,
    /// Halve content when a stage model has a small context window
    #[serde(default = "default_true")]
    split_on_low_context: bool,
    /// Context length below which content is halved
    #[serde(default = "default_split_threshold")]
    context_split_threshold: u64,
}

fn default_max_attempts() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_split_threshold() -> u64 {
    DEFAULT_SPLIT_THRESHOLD
}

/// Where story records live.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct StorageConfig {
    /// State directory, empty for the platform data directory
    #[serde(default)]
    state_dir: String,
}

impl StorageConfig {
    /// The configured directory, or `<data dir>/contextfox`.
    pub fn resolved_state_dir(&self) -> PathBuf {
        if !self.state_dir.trim().is_empty() {
            return PathBuf::from(self.state_dir.trim());
        }
        dirs::data_dir()
            .map(|d| d.join("contextfox"))
            .unwrap_or_else(|| PathBuf::from(".contextfox"))
    }
}

/// Model assigned to every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct TaskModels {
    /// Perspective detection
    perspective: ModelChoice,
    /// Title detection
    title: ModelChoice,
    /// Character cards
    characters: ModelChoice,
    /// Location cards
    locations: ModelChoice,
    /// Concept cards
    concepts: ModelChoice,
    /// Summary
    summary: ModelChoice,
    /// Plot essentials
    plot_essentials: ModelChoice,
    /// Core self
    core_self: ModelChoice,
}

impl TaskModels {
    /// Every stage set to the same model.
    pub fn uniform(model: impl Into<ModelChoice>) -> Self {
        let model = model.into();
        Self {
            perspective: model.clone(),
            title: model.clone(),
            characters: model.clone(),
            locations: model.clone(),
            concepts: model.clone(),
            summary: model.clone(),
            plot_essentials: model.clone(),
            core_self: model,
        }
    }

    /// Model for a stage.
    pub fn for_kind(&self, kind: TaskKind) -> &ModelChoice {
        match kind {
            TaskKind::Perspective => &self.perspective,
            TaskKind::Title => &self.title,
            TaskKind::Characters => &self.characters,
            TaskKind::Locations => &self.locations,
            TaskKind::Concepts => &self.concepts,
            TaskKind::Summary => &self.summary,
            TaskKind::PlotEssentials => &self.plot_essentials,
            TaskKind::CoreSelf => &self.core_self,
        }
    }

    /// Replace the model for a stage.
    pub fn set(&mut self, kind: TaskKind, model: impl Into<ModelChoice>) {
        let slot = match kind {
            TaskKind::Perspective => &mut self.perspective,
            TaskKind::Title => &mut self.title,
            TaskKind::Characters => &mut self.characters,
            TaskKind::Locations => &mut self.locations,
            TaskKind::Concepts => &mut self.concepts,
            TaskKind::Summary => &mut self.summary,
            TaskKind::PlotEssentials => &mut self.plot_essentials,
            TaskKind::CoreSelf => &mut self.core_self,
        };
        *slot = model.into();
    }

    /// All stage models in pipeline order.
    pub fn all(&self) -> Vec<&ModelChoice> {
        <TaskKind as strum::IntoEnumIterator>::iter()
            .map(|kind| self.for_kind(kind))
            .collect()
    }
}

/// Model selection and parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct ModelsConfig {
    /// AI Dungeon model the cards target
    story_model: String,
    /// AI Dungeon model name to underlying model name
    #[serde(default)]
    story_model_aliases: HashMap<String, String>,
    /// Active stage models
    tasks: TaskModels,
    /// Named stage model sets
    #[serde(default)]
    presets: BTreeMap<String, TaskModels>,
    /// Parameters for models without an override
    #[serde(default)]
    default_params: ModelParams,
    /// Per-model parameter overrides
    #[serde(default)]
    params: HashMap<String, ModelParams>,
}

/// Raw prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct PromptsConfig {
    /// Addendum used after a refusal
    refusal: String,
    /// Perspective detection
    perspective: String,
    /// Title detection
    title: String,
    /// Character cards
    characters: String,
    /// Location cards
    locations: String,
    /// Concept cards
    concepts: String,
    /// Summary
    summary: String,
    /// Plot essentials, first pass
    plot_essentials: String,
    /// Plot essentials, continuing prior notes
    plot_essentials_with_context: String,
    /// Core self
    core_self: String,
}

impl PromptsConfig {
    /// Parse every template.
    pub fn parse(&self) -> ContextFoxResult<PromptSet> {
        let parse = |name: &str, source: &str| {
            PromptTemplate::parse(source).map_err(|e| {
                ContextFoxError::from(ConfigError::new(format!("prompt '{}': {}", name, e.kind)))
            })
        };
        Ok(PromptSet {
            perspective: parse("perspective", &self.perspective)?,
            title: parse("title", &self.title)?,
            characters: parse("characters", &self.characters)?,
            locations: parse("locations", &self.locations)?,
            concepts: parse("concepts", &self.concepts)?,
            summary: parse("summary", &self.summary)?,
            plot_essentials: parse("plot_essentials", &self.plot_essentials)?,
            plot_essentials_with_context: parse(
                "plot_essentials_with_context",
                &self.plot_essentials_with_context,
            )?,
            core_self: parse("core_self", &self.core_self)?,
        })
    }
}

/// Complete ContextFox configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct ContextFoxConfig {
    /// Completion API
    api: ApiConfig,
    /// Pipeline switches
    processing: ProcessingConfig,
    /// Persistence
    #[serde(default)]
    storage: StorageConfig,
    /// Models
    models: ModelsConfig,
    /// Prompt templates
    prompts: PromptsConfig,
}

impl ContextFoxConfig {
    /// Load configuration with precedence: current dir > home dir > bundled defaults.
    #[instrument]
    pub fn load() -> ContextFoxResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/contextfox/contextfox.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("contextfox").required(false));
        Self::finish(builder)
    }

    /// Bundled defaults overlaid with one explicit file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ContextFoxResult<Self> {
        debug!("Loading configuration from file");
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()));
        Self::finish(builder)
    }

    /// Bundled defaults overlaid with a TOML string.
    pub fn from_toml_str(overrides: &str) -> ContextFoxResult<Self> {
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(overrides, FileFormat::Toml));
        Self::finish(builder)
    }

    /// Bundled defaults only.
    pub fn bundled() -> ContextFoxResult<Self> {
        Self::from_toml_str("")
    }

    fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> ContextFoxResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to load configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unknown template placeholders and impossible settings.
    pub fn validate(&self) -> ContextFoxResult<()> {
        if self.processing.max_attempts == 0 {
            return Err(ConfigError::new("processing.max_attempts must be at least 1").into());
        }
        self.prompts.parse()?;
        Ok(())
    }

    /// Story model name for `$model`, with aliases resolved.
    pub fn story_model_name(&self) -> String {
        let name = &self.models.story_model;
        self.models
            .story_model_aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, underlying)| underlying.clone())
            .unwrap_or_else(|| name.clone())
    }

    /// Replace the stage models with a named preset.
    pub fn apply_preset(&mut self, name: &str) -> ContextFoxResult<()> {
        let preset = self
            .models
            .presets
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, models)| models.clone())
            .ok_or_else(|| ConfigError::new(format!("Unknown model preset '{}'", name)))?;
        debug!(preset = name, "Applied model preset");
        self.models.tasks = preset;
        Ok(())
    }

    /// Override the permission gate.
    pub fn set_require_permission(&mut self, require: bool) {
        self.processing.require_permission_between_parts = require;
    }

    /// Override content splitting.
    pub fn set_split_on_low_context(&mut self, split: bool) {
        self.processing.split_on_low_context = split;
    }

    /// Resolve everything the pipeline needs.
    pub fn pipeline_settings(&self) -> ContextFoxResult<PipelineSettings> {
        Ok(PipelineSettings {
            task_models: self.models.tasks.clone(),
            prompts: self.prompts.parse()?,
            refusal_prompt: self.prompts.refusal.clone(),
            story_model: self.story_model_name(),
            default_params: self.models.default_params.clone(),
            model_params: self.models.params.clone(),
            retry: RetryPolicy::new(self.processing.max_attempts),
            require_permission_between_parts: self.processing.require_permission_between_parts,
            split_on_low_context: self.processing.split_on_low_context,
            context_split_threshold: self.processing.context_split_threshold,
        })
    }
}

/// Resolved settings handed to the pipeline.
#[derive(Debug, Clone, Getters)]
pub struct PipelineSettings {
    /// Model per stage
    task_models: TaskModels,
    /// Parsed templates
    prompts: PromptSet,
    /// Refusal addendum
    refusal_prompt: String,
    /// `$model` value
    story_model: String,
    /// Fallback parameters
    default_params: ModelParams,
    /// Per-model parameters
    model_params: HashMap<String, ModelParams>,
    /// Attempts per task
    retry: RetryPolicy,
    /// Stop between parts
    require_permission_between_parts: bool,
    /// Halve content for small-context models
    split_on_low_context: bool,
    /// Context length triggering a split
    context_split_threshold: u64,
}

impl PipelineSettings {
    /// Parameters for a model id.
    pub fn params_for(&self, model_id: &str) -> &ModelParams {
        self.model_params
            .get(model_id)
            .unwrap_or(&self.default_params)
    }

    /// Copy with a different permission gate.
    pub fn with_require_permission(mut self, require: bool) -> Self {
        self.require_permission_between_parts = require;
        self
    }

    /// Copy with one stage model replaced.
    pub fn with_task_model(mut self, kind: TaskKind, model: impl Into<ModelChoice>) -> Self {
        self.task_models.set(kind, model);
        self
    }

    /// Copy with every stage model replaced.
    pub fn with_task_models(mut self, models: TaskModels) -> Self {
        self.task_models = models;
        self
    }

    /// Copy with a different attempt budget.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
