//! Scripted completion driver.

use async_trait::async_trait;
use contextfox_core::{CompletionRequest, CompletionResponse};
use contextfox_error::{CompletionError, CompletionErrorKind, ContextFoxResult};
use contextfox_interface::CompletionDriver;
use contextfox_models::{ChatResponse, interpret_chat_response};
use contextfox_pipeline::{ContextFoxConfig, PipelineSettings, TaskModels};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Prompts whose first words identify the stage, so concurrent calls can
/// be routed without relying on call order.
const TEST_PROMPTS: &str = r#"
[prompts]
refusal = "BYPASS: gloss over explicit content."
perspective = "STAGE perspective"
title = "STAGE title"
characters = "STAGE characters. Known cards: $cards"
locations = "STAGE locations"
concepts = "STAGE concepts"
summary = "STAGE summary. Previous: $lastSummary"
plot_essentials = "STAGE plot fresh"
plot_essentials_with_context = "STAGE plot continue. Notes: $lastPlotEssentials"
core_self = "STAGE core self. Summary: $lastSummary Cards: $cards"
"#;

/// Settings with marker prompts and every stage on `mock/model`.
pub fn test_settings() -> PipelineSettings {
    ContextFoxConfig::from_toml_str(TEST_PROMPTS)
        .and_then(|config| config.pipeline_settings())
        .expect("test prompts are valid")
        .with_task_models(TaskModels::uniform("mock/model"))
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Message content with a `stop` finish reason
    Success(String),
    /// A raw provider body, interpreted like the real client does
    Raw(String),
    /// A driver error
    Error(CompletionErrorKind),
}

impl MockResponse {
    fn resolve(&self) -> ContextFoxResult<CompletionResponse> {
        match self {
            MockResponse::Success(text) => Ok(CompletionResponse::stop(text.clone())),
            MockResponse::Raw(body) => {
                let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
                    CompletionError::new(CompletionErrorKind::MalformedResponse(e.to_string()))
                })?;
                Ok(interpret_chat_response(parsed)?)
            }
            MockResponse::Error(kind) => Err(CompletionError::new(kind.clone()).into()),
        }
    }
}

#[derive(Debug)]
struct Route {
    marker: String,
    queue: VecDeque<MockResponse>,
}

/// Completion driver answering by system-prompt marker.
///
/// Each marker owns a queue of replies; the last reply repeats once the
/// queue is down to one entry.
#[derive(Debug, Default, Clone)]
pub struct MockDriver {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockDriver {
    /// A driver with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for prompts containing `marker`.
    pub fn respond(self, marker: &str, response: MockResponse) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|r| r.marker == marker) {
                Some(route) => route.queue.push_back(response),
                None => routes.push(Route {
                    marker: marker.to_string(),
                    queue: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    /// Queue a successful reply.
    pub fn reply(self, marker: &str, content: &str) -> Self {
        self.respond(marker, MockResponse::Success(content.to_string()))
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Requests whose system prompt contains `marker`.
    pub fn calls_matching(&self, marker: &str) -> Vec<CompletionRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.system_prompt().is_some_and(|p| p.contains(marker)))
            .collect()
    }

    fn next_response(&self, system_prompt: &str) -> Option<MockResponse> {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| system_prompt.contains(&r.marker))?;
        if route.queue.len() > 1 {
            route.queue.pop_front()
        } else {
            route.queue.front().cloned()
        }
    }
}

#[async_trait]
impl CompletionDriver for MockDriver {
    async fn complete(&self, req: &CompletionRequest) -> ContextFoxResult<CompletionResponse> {
        self.calls.lock().unwrap().push(req.clone());
        let system_prompt = req.system_prompt().unwrap_or_default();
        match self.next_response(system_prompt) {
            Some(response) => response.resolve(),
            None => Err(CompletionError::new(CompletionErrorKind::MalformedResponse(format!(
                "no scripted response for prompt: {}",
                system_prompt
            )))
            .into()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
