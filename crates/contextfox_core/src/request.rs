//! Completion request and response types.

use crate::{ModelParams, ReasoningEffort};
use serde::{Deserialize, Serialize};

/// Roles of chat participants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions
    System,
    /// Story content
    User,
    /// Model output
    Assistant,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender role
    pub role: Role,
    /// Text content
    pub content: String,
}

impl Message {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Requested output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Format name, `json_object` for every pipeline stage
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    /// Ask for a JSON object.
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

/// Reasoning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasoning {
    /// Effort level
    pub effort: ReasoningEffort,
}

/// A chat completion request.
///
/// # Examples
///
/// ```
/// use contextfox_core::{CompletionRequest, Message};
///
/// let request = CompletionRequest::builder()
///     .model("z-ai/glm-4.5")
///     .messages(vec![Message::system("rules"), Message::user("story")])
///     .max_tokens(1000u32)
///     .build()
///     .unwrap();
/// assert_eq!(request.messages.len(), 2);
/// assert!(request.temperature.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct CompletionRequest {
    /// Model id
    pub model: String,
    /// System then user message
    pub messages: Vec<Message>,
    /// Output format
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Output token ceiling
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Top-k sampling
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Frequency penalty
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Reasoning settings
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
}

impl CompletionRequest {
    /// Start building a request.
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::default()
    }

    /// A JSON-mode request for one pipeline stage.
    pub fn for_stage(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
        params: &ModelParams,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system_prompt), Message::user(user_content)],
            response_format: Some(ResponseFormat::json_object()),
            max_tokens: Some(*params.max_tokens()),
            temperature: *params.temperature(),
            top_p: *params.top_p(),
            top_k: *params.top_k(),
            frequency_penalty: *params.frequency_penalty(),
            presence_penalty: *params.presence_penalty(),
            reasoning: params.reasoning_enabled().then(|| Reasoning {
                effort: *params.reasoning_effort(),
            }),
        }
    }

    /// The system prompt, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

/// The text a model returned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Message content, expected to be JSON
    pub content: String,
    /// Why generation stopped
    pub finish_reason: Option<String>,
    /// Output hit the token ceiling
    pub truncated: bool,
}

impl CompletionResponse {
    /// A complete response with `stop` as the finish reason.
    pub fn stop(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some("stop".to_string()),
            truncated: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_request_serializes_wire_shape() {
        let request = CompletionRequest::for_stage("m", "sys", "user", &ModelParams::default());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "user");
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["reasoning"]["effort"], "medium");
        assert_eq!(json["max_tokens"], 20000);
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn test_reasoning_omitted_when_disabled() {
        let params = ModelParams::default().without_reasoning();
        let request = CompletionRequest::for_stage("m", "sys", "user", &params);
        assert!(request.reasoning.is_none());
        assert_eq!(request.system_prompt(), Some("sys"));
    }
}
