//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use chrono::Utc;
use screenpilot_core::computer::{
    ActionContext, ActionOutcome, ComputerAction, ComputerProvider, ScreenSize, StartOptions,
    StartedSession, UploadRequest,
};
use screenpilot_core::error::{AiProviderError, ComputerError};
use screenpilot_core::provider::{
    AiProvider, GenerateObjectRequest, GenerateObjectResponse, GenerateTextRequest,
    GenerateTextResponse,
};
use screenpilot_core::message::AgentMessage;
use std::collections::VecDeque;
use std::sync::Mutex;

/// History for tools that never look at it.
pub static NO_HISTORY: Vec<AgentMessage> = Vec::new();

pub struct MockComputer {
    upload_base: Option<String>,
    fail_actions: bool,
    performed: Mutex<Vec<(ComputerAction, ActionContext)>>,
}

impl MockComputer {
    pub fn new() -> Self {
        Self {
            upload_base: None,
            fail_actions: false,
            performed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_upload_base(mut self, base: &str) -> Self {
        self.upload_base = Some(base.to_string());
        self
    }

    pub fn failing_actions(mut self) -> Self {
        self.fail_actions = true;
        self
    }

    pub fn performed(&self) -> Vec<(ComputerAction, ActionContext)> {
        self.performed.lock().unwrap().clone()
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
            live_url: None,
        })
    }

    async fn stop(&self, _session_id: &str) -> Result<(), ComputerError> {
        Ok(())
    }

    async fn screen_size(&self) -> Result<ScreenSize, ComputerError> {
        Ok(ScreenSize { width: 1280, height: 800 })
    }

    async fn take_screenshot(&self, _session_id: &str) -> Result<String, ComputerError> {
        Ok("iVBORw0KGgo=".into())
    }

    async fn upload_screenshot(&self, request: UploadRequest) -> Result<Option<String>, ComputerError> {
        Ok(self
            .upload_base
            .as_ref()
            .map(|base| format!("{base}/{}/{}.png", request.session_id, request.step)))
    }

    async fn perform_action(
        &self,
        action: &ComputerAction,
        context: ActionContext,
    ) -> Result<ActionOutcome, ComputerError> {
        if self.fail_actions {
            return Err(ComputerError::ActionFailed {
                session_id: context.session_id,
                reason: "sandbox crashed".into(),
            });
        }
        self.performed.lock().unwrap().push((action.clone(), context.clone()));
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

/// Returns queued `generate_object` results in order and records requests.
pub struct ObjectProvider {
    model: String,
    objects: Mutex<VecDeque<serde_json::Value>>,
    pub requests: Mutex<Vec<GenerateObjectRequest>>,
}

impl ObjectProvider {
    pub fn new(model: &str, objects: Vec<serde_json::Value>) -> Self {
        Self {
            model: model.to_string(),
            objects: Mutex::new(objects.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for ObjectProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_text(
        &self,
        _request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse, AiProviderError> {
        Ok(GenerateTextResponse::default())
    }

    async fn generate_object(
        &self,
        request: GenerateObjectRequest,
    ) -> Result<GenerateObjectResponse, AiProviderError> {
        self.requests.lock().unwrap().push(request);
        let object = self
            .objects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AiProviderError::MalformedResponse("script exhausted".into()))?;
        Ok(GenerateObjectResponse { object, usage: None })
    }
}

/// Fetcher for tests whose histories only carry inline images.
pub struct NoFetch;

#[async_trait]
impl screenpilot_transport::ImageFetcher for NoFetch {
    async fn fetch(
        &self,
        url: &str,
    ) -> Result<screenpilot_transport::FetchedImage, screenpilot_core::error::TransportError> {
        Err(screenpilot_core::error::TransportError::Http {
            url: url.to_string(),
            status: 404,
        })
    }
}
