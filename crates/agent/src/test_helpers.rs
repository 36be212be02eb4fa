//! Scripted collaborators shared by unit tests.

use async_trait::async_trait;
use chrono::Utc;
use screenpilot_core::computer::{
    ActionContext, ActionOutcome, ComputerAction, ComputerProvider, ScreenSize, StartOptions,
    StartedSession,
};
use screenpilot_core::error::{AiProviderError, ComputerError, TransportError};
use screenpilot_core::message::ToolCall;
use screenpilot_core::provider::{
    AiProvider, GenerateObjectRequest, GenerateObjectResponse, GenerateTextRequest,
    GenerateTextResponse, Usage,
};
use screenpilot_transport::{FetchedImage, ImageFetcher};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A model that replays scripted responses in order.
///
/// Once the script runs out, `fallback` is returned for every further call;
/// without a fallback the provider reports a malformed response.
pub struct SequentialMockProvider {
    texts: Mutex<VecDeque<Result<GenerateTextResponse, AiProviderError>>>,
    objects: Mutex<VecDeque<serde_json::Value>>,
    fallback: Option<GenerateTextResponse>,
    pub requests: Mutex<Vec<GenerateTextRequest>>,
}

impl SequentialMockProvider {
    pub fn new(texts: Vec<GenerateTextResponse>) -> Self {
        Self {
            texts: Mutex::new(texts.into_iter().map(Ok).collect()),
            objects: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_objects(self, objects: Vec<serde_json::Value>) -> Self {
        *self.objects.lock().unwrap() = objects.into();
        self
    }

    pub fn with_fallback(mut self, response: GenerateTextResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn failing_with(error: AiProviderError) -> Self {
        let provider = Self::new(vec![]);
        provider.texts.lock().unwrap().push_back(Err(error));
        provider
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for SequentialMockProvider {
    fn model_name(&self) -> &str {
        "claude-mock"
    }

    async fn generate_text(
        &self,
        request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse, AiProviderError> {
        self.requests.lock().unwrap().push(request);
        match self.texts.lock().unwrap().pop_front() {
            Some(scripted) => scripted,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AiProviderError::MalformedResponse("script exhausted".into())),
        }
    }

    async fn generate_object(
        &self,
        _request: GenerateObjectRequest,
    ) -> Result<GenerateObjectResponse, AiProviderError> {
        let object = self
            .objects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AiProviderError::MalformedResponse("no object scripted".into()))?;
        Ok(GenerateObjectResponse { object, usage: None })
    }
}

/// A response carrying the given tool calls.
pub fn tool_response(text: &str, calls: Vec<ToolCall>) -> GenerateTextResponse {
    GenerateTextResponse {
        text: Some(text.to_string()),
        reasoning: None,
        tool_calls: calls,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args,
    }
}

pub struct MockComputer {
    pub actions: Mutex<Vec<ComputerAction>>,
}

impl MockComputer {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ComputerProvider for MockComputer {
    async fn start(
        &self,
        session_id: &str,
        _options: Option<StartOptions>,
    ) -> Result<StartedSession, ComputerError> {
        Ok(StartedSession {
            provider_id: format!("box-{session_id}"),
            live_url: Some(format!("https://live/{session_id}")),
        })
    }

    async fn stop(&self, _session_id: &str) -> Result<(), ComputerError> {
        Ok(())
    }

    async fn screen_size(&self) -> Result<ScreenSize, ComputerError> {
        Ok(ScreenSize { width: 1024, height: 768 })
    }

    async fn take_screenshot(&self, _session_id: &str) -> Result<String, ComputerError> {
        Ok("AAAA".into())
    }

    async fn perform_action(
        &self,
        action: &ComputerAction,
        context: ActionContext,
    ) -> Result<ActionOutcome, ComputerError> {
        self.actions.lock().unwrap().push(action.clone());
        Ok(ActionOutcome {
            kind: action.kind().to_string(),
            action_performed: action.describe(),
            reasoning: context.reasoning.unwrap_or_default(),
            timestamp: Utc::now(),
        })
    }

    async fn navigate_to(&self, _session_id: &str, _url: &str) -> Result<(), ComputerError> {
        Ok(())
    }

    async fn current_url(&self, _session_id: &str) -> Result<Option<String>, ComputerError> {
        Ok(None)
    }
}

pub struct NoFetch;

#[async_trait]
impl ImageFetcher for NoFetch {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, TransportError> {
        Err(TransportError::Http {
            url: url.to_string(),
            status: 404,
        })
    }
}
