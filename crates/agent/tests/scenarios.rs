//! End-to-end scenarios for the screenpilot step loop.
//!
//! Each test drives a full task through [`SessionManager`] with a scripted
//! model and a mock computer, then inspects what the model was shown.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use screenpilot_agent::SessionManager;
use screenpilot_config::AppConfig;
use screenpilot_core::computer::{
    ActionContext, ActionOutcome, ComputerAction, ComputerProvider, ScreenSize, StartOptions,
    StartedSession, UploadRequest,
};
use screenpilot_core::error::{AiProviderError, ComputerError, Error, TransportError};
use screenpilot_core::event::DomainEvent;
use screenpilot_core::message::{AgentMessage, ContentItem, ImageSource, ToolCall};
use screenpilot_core::provider::{
    AiProvider, GenerateObjectRequest, GenerateObjectResponse, GenerateTextRequest,
    GenerateTextResponse, Usage,
};
use screenpilot_core::session::TaskStatus;
use screenpilot_memory::InMemorySessionStore;
use screenpilot_transport::{FetchedImage, ImageFetcher};
use tokio::sync::broadcast::error::TryRecvError;

// ── Mocks ────────────────────────────────────────────────────────────────

/// A model that replays scripted turns, then repeats `fallback` forever.
struct ScriptedModel {
    name: String,
    turns: Mutex<VecDeque<GenerateTextResponse>>,
    fallback: Option<GenerateTextResponse>,
    objects: Mutex<VecDeque<serde_json::Value>>,
    requests: Mutex<Vec<GenerateTextRequest>>,
    object_requests: Mutex<Vec<GenerateObjectRequest>>,
}

impl ScriptedModel {
    fn new(name: &str, turns: Vec<GenerateTextResponse>) -> Self {
        Self {
            name: name.to_string(),
            turns: Mutex::new(turns.into()),
            fallback: None,
            objects: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            object_requests: Mutex::new(Vec::new()),
        }
    }

    fn with_fallback(mut self, turn: GenerateTextResponse) -> Self {
        self.fallback = Some(turn);
        self
    }

    fn with_objects(self, objects: Vec<serde_json::Value>) -> Self {
        *self.objects.lock().unwrap() = objects.into();
        self
    }

    fn requests(&self) -> Vec<GenerateTextRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn object_calls(&self) -> usize {
        self.object_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for ScriptedModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn generate_text(
        &self,
        request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse, AiProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self.turns.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| AiProviderError::MalformedResponse("script exhausted".into()))
    }

    async fn generate_object(
        &self,
        request: GenerateObjectRequest,
    ) -> Result<GenerateObjectResponse, AiProviderError> {
        self.object_requests.lock().unwrap().push(request);
        let object = self
            .objects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AiProviderError::MalformedResponse("no object scripted".into()))?;
        Ok(GenerateObjectResponse { object, usage: None })
    }
}

const SMALL_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// A sandbox that records actions, hands out scripted screenshots (then a
/// small default) and optionally hosts uploads under `upload_base`.
struct RecordingComputer {
    actions: Mutex<Vec<ComputerAction>>,
    screenshots: Mutex<VecDeque<String>>,
    upload_base: Option<String>,
}

impl RecordingComputer {
    fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            screenshots: Mutex::new(VecDeque::new()),
            upload_base: None,
        }
    }

    fn with_screenshots(self, screenshots: Vec<String>) -> Self {
        *self.screenshots.lock().unwrap() = screenshots.into();
        self
    }

    fn with_upload_base(mut self, base: &str) -> Self {
        self.upload_base = Some(base.to_string());
        self
    }
}

/// How a desktop sandbox reports a performed action.
fn performed(action: &ComputerAction) -> String {
    match action {
        ComputerAction::Click { x, y, button } => {
            format!("Clicked (button: {button}) at position ({x}, {y})")
        }
        other => other.describe(),
    }
}

#[async_trait]
impl ComputerProvider for RecordingComputer {
    async fn start(
        &self,
        session_id: &str,
        _options: Option<StartOptions>,
    ) -> Result<StartedSession, ComputerError> {
        Ok(StartedSession {
            provider_id: format!("sandbox-{session_id}"),
            live_url: None,
        })
    }

    async fn stop(&self, _session_id: &str) -> Result<(), ComputerError> {
        Ok(())
    }

    async fn screen_size(&self) -> Result<ScreenSize, ComputerError> {
        Ok(ScreenSize { width: 1280, height: 720 })
    }

    async fn take_screenshot(&self, _session_id: &str) -> Result<String, ComputerError> {
        let scripted = self.screenshots.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| SMALL_PNG.to_string()))
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
        self.actions.lock().unwrap().push(action.clone());
        Ok(ActionOutcome {
            kind: action.kind().to_string(),
            action_performed: performed(action),
            reasoning: context.reasoning.unwrap_or_default(),
            timestamp: Utc::now(),
        })
    }

    async fn navigate_to(&self, _session_id: &str, _url: &str) -> Result<(), ComputerError> {
        Ok(())
    }

    async fn current_url(&self, _session_id: &str) -> Result<Option<String>, ComputerError> {
        Ok(Some("https://shop.example".into()))
    }
}

struct OfflineFetcher;

/// Serves a tiny PNG for any URL and remembers every request.
struct CountingFetcher {
    requested: Mutex<Vec<String>>,
}

impl CountingFetcher {
    fn new() -> Self {
        Self {
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, TransportError> {
        self.requested.lock().unwrap().push(url.to_string());
        Ok(FetchedImage {
            media_type: "image/png".into(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        })
    }
}

#[async_trait]
impl ImageFetcher for OfflineFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, TransportError> {
        Err(TransportError::Network {
            url: url.to_string(),
            reason: "offline".into(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn turn(calls: Vec<ToolCall>) -> GenerateTextResponse {
    GenerateTextResponse {
        text: Some("working on it".into()),
        reasoning: None,
        tool_calls: calls,
        usage: Some(Usage {
            prompt_tokens: 100,
            completion_tokens: 20,
            total_tokens: 120,
        }),
    }
}

fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

fn complete(id: &str) -> ToolCall {
    call(
        id,
        "task_complete",
        serde_json::json!({
            "completionSummary": "found it",
            "verificationEvidence": "visible on screen",
            "finalStateDescription": "result page"
        }),
    )
}

fn wait(id: &str) -> ToolCall {
    call(id, "computer_action", serde_json::json!({"action": {"type": "wait", "duration": 0}}))
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.models.repair_arguments = false;
    config.computer.upload_screenshots = false;
    config
}

fn manager(config: AppConfig, model: Arc<ScriptedModel>, computer: Arc<RecordingComputer>) -> SessionManager {
    manager_with_fetcher(config, model, computer, Arc::new(OfflineFetcher))
}

fn manager_with_fetcher(
    config: AppConfig,
    model: Arc<ScriptedModel>,
    computer: Arc<RecordingComputer>,
    fetcher: Arc<dyn ImageFetcher>,
) -> SessionManager {
    SessionManager::new(
        config,
        Arc::new(InMemorySessionStore::new()),
        computer,
        model,
        fetcher,
    )
}

fn total_images(messages: &[AgentMessage]) -> usize {
    messages.iter().map(|m| m.image_count()).sum()
}

fn texts(messages: &[AgentMessage]) -> Vec<String> {
    messages.iter().map(|m| m.text()).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn click_result_and_screenshot_reach_the_next_step() {
    init_tracing();
    let model = Arc::new(
        ScriptedModel::new(
            "claude-sonnet-4",
            vec![
                turn(vec![call(
                    "c1",
                    "computer_action",
                    serde_json::json!({
                        "action": {"type": "click", "x": 100, "y": 50},
                        "nextGoal": "open the search box"
                    }),
                )]),
                turn(vec![complete("c2")]),
            ],
        )
        .with_objects(vec![serde_json::json!({"result": "clicked"})]),
    );
    let computer = Arc::new(RecordingComputer::new());
    let manager = manager(config(), model.clone(), computer.clone());
    let session = manager.start_session(None).await.unwrap();

    let output = manager.execute_task(&session.id, "click the search box", None).await.unwrap();
    assert_eq!(output, serde_json::json!({"result": "clicked"}));

    assert_eq!(
        *computer.actions.lock().unwrap(),
        vec![ComputerAction::Click { x: 100, y: 50, button: Default::default() }]
    );

    let requests = model.requests();
    let step_two = &requests[1].messages;
    let result = step_two.last().unwrap();
    assert_eq!(result.text(), "Action performed: Clicked (button: left) at position (100, 50)");
    assert_eq!(result.image_count(), 1);

    let session = manager.get_session(&session.id).await.unwrap();
    let logs = &session.tasks[0].logs;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].actions, vec!["click left at (100, 50)".to_string()]);
    assert_eq!(
        logs[0].planning.as_ref().and_then(|p| p.next_goal.as_deref()),
        Some("open the search box")
    );
    assert_eq!(logs[0].usage.map(|u| u.total_tokens), Some(120));
}

#[tokio::test]
async fn running_out_of_steps_is_an_error() {
    init_tracing();
    let model = Arc::new(ScriptedModel::new("gpt-4o", vec![]).with_fallback(turn(vec![wait("w")])));
    let computer = Arc::new(RecordingComputer::new());
    let mut config = config();
    config.agent.max_steps = 300;
    let manager = manager(config, model.clone(), computer);
    let mut events = manager.event_bus().subscribe();
    let session = manager.start_session(None).await.unwrap();

    let err = manager.execute_task(&session.id, "never done", None).await.unwrap_err();
    assert!(matches!(err, Error::StepBudgetExceeded { max_steps: 300 }));
    assert_eq!(model.requests().len(), 299);
    assert_eq!(model.object_calls(), 0);

    let session = manager.get_session(&session.id).await.unwrap();
    let task = &session.tasks[0];
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.result.is_none());
    assert_eq!(task.logs.len(), 299);

    // the bus is smaller than the event count; skip over lag
    let mut exhausted = false;
    loop {
        match events.try_recv() {
            Ok(event) => {
                if matches!(event.as_ref(), DomainEvent::StepBudgetExhausted { max_steps: 300, .. }) {
                    exhausted = true;
                }
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    assert!(exhausted);
}

#[tokio::test]
async fn memory_outlives_the_conversation_window() {
    init_tracing();
    let mut turns = vec![turn(vec![call(
        "m1",
        "memory",
        serde_json::json!({"action": "store", "key": "order", "data": "A-1029"}),
    )])];
    for i in 0..12 {
        turns.push(turn(vec![wait(&format!("w{i}"))]));
    }
    turns.push(turn(vec![call(
        "m2",
        "memory",
        serde_json::json!({"action": "retrieve", "key": "order"}),
    )]));
    turns.push(turn(vec![complete("done")]));

    let model = Arc::new(
        ScriptedModel::new("claude-sonnet-4", turns)
            .with_objects(vec![serde_json::json!({"result": "A-1029"})]),
    );
    let manager = manager(config(), model.clone(), Arc::new(RecordingComputer::new()));
    let session = manager.start_session(None).await.unwrap();

    manager.execute_task(&session.id, "note the order id", None).await.unwrap();

    let requests = model.requests();
    // step 14 issues the retrieve; step 15 sees its result
    let retrieve_view = texts(&requests[13].messages);
    assert!(!retrieve_view.iter().any(|t| t == "Stored 'order'."));
    assert_eq!(retrieve_view[0], "note the order id");

    let after = texts(&requests[14].messages);
    assert_eq!(after.last().unwrap(), "order: A-1029");

    let memory = manager.memory(&session.id).await.unwrap();
    assert_eq!(memory.retrieve("order").await.as_deref(), Some("A-1029"));
}

#[tokio::test]
async fn view_stays_bounded_with_instructions_first() {
    init_tracing();
    let mut turns: Vec<_> = (0..20).map(|i| turn(vec![wait(&format!("w{i}"))])).collect();
    turns.push(turn(vec![complete("done")]));
    let model = Arc::new(
        ScriptedModel::new("claude-sonnet-4", turns).with_objects(vec![serde_json::json!({"result": "ok"})]),
    );
    let manager = manager(config(), model.clone(), Arc::new(RecordingComputer::new()));
    let session = manager.start_session(None).await.unwrap();
    manager.execute_task(&session.id, "wait around", None).await.unwrap();

    for request in model.requests() {
        let first = &request.messages[0];
        assert_eq!(first.text(), "wait around");
        assert_eq!(first.image_count(), 1);
        // instructions + at most 7 chunks of (result, model turn)
        assert!(request.messages.len() <= 1 + 7 * 2, "{}", request.messages.len());
    }
}

#[tokio::test]
async fn completion_gate_forces_finalization_on_fourth_attempt() {
    init_tracing();
    let model = Arc::new(
        ScriptedModel::new(
            "claude-sonnet-4",
            vec![
                turn(vec![complete("t1")]),
                turn(vec![complete("t2")]),
                turn(vec![complete("t3")]),
                turn(vec![complete("t4")]),
            ],
        )
        .with_objects(vec![serde_json::json!({"result": "best effort"})]),
    );
    let rejection = serde_json::json!({
        "approved": false,
        "reason": "no proof",
        "feedback": "Scroll down and show the confirmation number."
    });
    let evaluator = Arc::new(
        ScriptedModel::new("gpt-4o", vec![])
            .with_objects(vec![rejection.clone(), rejection.clone(), rejection]),
    );
    let manager = manager(config(), model.clone(), Arc::new(RecordingComputer::new()))
        .with_evaluator(evaluator.clone());
    let session = manager.start_session(None).await.unwrap();

    let output = manager.execute_task(&session.id, "book it", None).await.unwrap();
    assert_eq!(output, serde_json::json!({"result": "best effort"}));
    assert_eq!(evaluator.object_calls(), 3);
    assert_eq!(model.object_calls(), 1);

    let requests = model.requests();
    assert_eq!(requests.len(), 4);
    let feedback = requests[1].messages.last().unwrap().text();
    assert!(feedback.contains("Scroll down and show the confirmation number."));
}

#[tokio::test]
async fn caller_schema_shapes_the_result() {
    init_tracing();
    let schema = serde_json::json!({
        "type": "object",
        "properties": { "price": { "type": "number" }, "currency": { "type": "string" } },
        "required": ["price", "currency"]
    });
    let model = Arc::new(
        ScriptedModel::new("claude-sonnet-4", vec![turn(vec![complete("t1")])])
            .with_objects(vec![serde_json::json!({"price": 19.99, "currency": "USD"})]),
    );
    let manager = manager(config(), model.clone(), Arc::new(RecordingComputer::new()));
    let session = manager.start_session(None).await.unwrap();

    let output = manager
        .execute_task(&session.id, "find the price", Some(schema.clone()))
        .await
        .unwrap();
    assert_eq!(output["currency"], "USD");
    assert_eq!(model.object_requests.lock().unwrap()[0].schema, schema);

    let stored = manager.get_session(&session.id).await.unwrap();
    assert_eq!(stored.tasks[0].output_schema.as_ref(), Some(&schema));
    assert!(matches!(
        stored.tasks[0].result.as_ref(),
        Some(v) if v["price"] == 19.99
    ));
}

#[tokio::test]
async fn second_task_reuses_session_memory() {
    init_tracing();
    let model = Arc::new(
        ScriptedModel::new(
            "claude-sonnet-4",
            vec![
                turn(vec![
                    call("m", "memory", serde_json::json!({"action": "store", "key": "user", "data": "ada"})),
                    complete("c1"),
                ]),
                turn(vec![call("r", "memory", serde_json::json!({"action": "retrieve", "key": "user"}))]),
                turn(vec![complete("c2")]),
            ],
        )
        .with_objects(vec![serde_json::json!({"result": "first"}), serde_json::json!({"result": "second"})]),
    );
    let manager = manager(config(), model.clone(), Arc::new(RecordingComputer::new()));
    let session = manager.start_session(None).await.unwrap();

    manager.execute_task(&session.id, "remember the user", None).await.unwrap();
    manager.execute_task(&session.id, "who was it?", None).await.unwrap();

    let requests = model.requests();
    assert_eq!(requests[2].messages.last().unwrap().text(), "user: ada");
    assert_eq!(manager.get_session(&session.id).await.unwrap().tasks.len(), 2);
}

#[tokio::test]
async fn uploaded_screenshots_are_fetched_once_while_windowed() {
    init_tracing();
    let model = Arc::new(ScriptedModel::new("claude-sonnet-4", vec![]).with_fallback(turn(vec![wait("w")])));
    let computer = Arc::new(RecordingComputer::new().with_upload_base("https://shots.example"));
    let fetcher = Arc::new(CountingFetcher::new());
    let mut config = config();
    config.computer.upload_screenshots = true;
    config.agent.max_steps = 12;
    let manager = manager_with_fetcher(config, model.clone(), computer, fetcher.clone());
    let session = manager.start_session(None).await.unwrap();

    let err = manager.execute_task(&session.id, "watch the screen", None).await.unwrap_err();
    assert!(matches!(err, Error::StepBudgetExceeded { max_steps: 12 }));

    let requests = model.requests();
    assert_eq!(requests.len(), 11);
    for request in &requests {
        for message in &request.messages {
            if let AgentMessage::User { content } = message {
                assert!(
                    content
                        .iter()
                        .all(|c| !matches!(c, ContentItem::Image { image: ImageSource::Url(_) })),
                    "model was sent an unresolved image"
                );
            }
        }
    }
    // setup screenshot plus the results of steps 4..=10
    assert_eq!(total_images(&requests[10].messages), 8);

    // the setup screenshot is uploaded as step 0, each action under its own step
    let expected: Vec<String> = (0..=10)
        .map(|step| format!("https://shots.example/{}/{step}.png", session.id))
        .collect();
    assert_eq!(fetcher.requested(), expected);
}

#[tokio::test]
async fn oversized_screenshot_is_dropped_for_byte_bounded_models() {
    init_tracing();
    // ~150 KB once decoded
    let oversized = "A".repeat(200_000);
    let model = Arc::new(
        ScriptedModel::new(
            "gemini-2.5-pro",
            vec![turn(vec![wait("w1")]), turn(vec![complete("c1")])],
        )
        .with_objects(vec![serde_json::json!({"result": "ok"})]),
    );
    let computer = Arc::new(
        RecordingComputer::new().with_screenshots(vec![SMALL_PNG.to_string(), oversized]),
    );
    let mut config = config();
    config.transport.max_bytes = 64 * 1024;
    let manager = manager(config, model.clone(), computer);
    let session = manager.start_session(None).await.unwrap();

    manager.execute_task(&session.id, "wait for the page", None).await.unwrap();

    let requests = model.requests();
    let step_two = &requests[1].messages;
    let latest = step_two.last().unwrap();
    assert_eq!(latest.text(), "Action performed: wait 0s");
    assert_eq!(latest.image_count(), 0);
    assert_eq!(step_two[0].text(), "wait for the page");
    assert_eq!(step_two[0].image_count(), 1);
    assert_eq!(total_images(step_two), 1);

    let finalize = &model.object_requests.lock().unwrap()[0];
    assert_eq!(total_images(&finalize.messages), 1);
}
