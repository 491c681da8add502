//! Model selection and generation parameters.

use serde::{Deserialize, Serialize};

/// A model id chosen for a stage, or the `None` sentinel to skip it.
///
/// # Examples
///
/// ```
/// use contextfox_core::ModelChoice;
///
/// assert!(ModelChoice::from("none").is_disabled());
/// assert!(!ModelChoice::from("z-ai/glm-4.5").is_disabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct ModelChoice(String);

impl ModelChoice {
    /// The sentinel that disables a stage.
    pub const DISABLED: &'static str = "None";

    /// A disabled stage.
    pub fn disabled() -> Self {
        Self(Self::DISABLED.to_string())
    }

    /// True when the stage should be skipped. Case-insensitive.
    pub fn is_disabled(&self) -> bool {
        let id = self.0.trim();
        id.is_empty() || id.eq_ignore_ascii_case(Self::DISABLED)
    }

    /// The model id, `None` when disabled.
    pub fn model_id(&self) -> Option<&str> {
        (!self.is_disabled()).then_some(self.0.trim())
    }

    /// The raw configured value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelChoice {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ModelChoice {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A model listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Provider model id
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    /// Context window in tokens, 0 when unknown
    #[serde(default)]
    pub context_length: u64,
}

/// How hard a reasoning model should think.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReasoningEffort {
    /// Barely any reasoning
    Minimal,
    /// Light reasoning
    Low,
    /// Balanced
    #[default]
    Medium,
    /// Thorough
    High,
    /// Maximum effort
    Xhigh,
}

/// Sampling parameters applied to every request for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct ModelParams {
    /// Sampling temperature
    temperature: Option<f32>,
    /// Output token ceiling
    max_tokens: u32,
    /// Nucleus sampling
    top_p: Option<f32>,
    /// Top-k sampling
    top_k: Option<u32>,
    /// Frequency penalty
    frequency_penalty: Option<f32>,
    /// Presence penalty
    presence_penalty: Option<f32>,
    /// Whether to request reasoning at all
    reasoning_enabled: bool,
    /// Effort when reasoning is enabled
    reasoning_effort: ReasoningEffort,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: 20_000,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            reasoning_enabled: true,
            reasoning_effort: ReasoningEffort::Medium,
        }
    }
}

impl ModelParams {
    /// Copy with reasoning switched off.
    pub fn without_reasoning(mut self) -> Self {
        self.reasoning_enabled = false;
        self
    }

    /// Copy with a different temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_disabled_sentinel_variants() {
        assert!(ModelChoice::from("None").is_disabled());
        assert!(ModelChoice::from("NONE").is_disabled());
        assert!(ModelChoice::from("").is_disabled());
        assert_eq!(ModelChoice::from(" openai/gpt-4o ").model_id(), Some("openai/gpt-4o"));
    }

    #[test]
    fn test_reasoning_effort_names() {
        assert_eq!(ReasoningEffort::Xhigh.to_string(), "xhigh");
        assert_eq!(ReasoningEffort::from_str("minimal").unwrap(), ReasoningEffort::Minimal);
    }

    #[test]
    fn test_params_defaults_and_partial_toml() {
        let params: ModelParams = toml::from_str("max_tokens = 4000").unwrap();
        assert_eq!(*params.max_tokens(), 4000);
        assert_eq!(*params.temperature(), Some(0.7));
        assert!(*params.reasoning_enabled());
    }
}
