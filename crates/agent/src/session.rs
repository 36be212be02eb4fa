//! Session lifecycle: start a sandbox, run tasks on it, shut it down.
//!
//! Memory and todo state belong to the session, not the task, so a follow-up
//! task on the same session can read what an earlier one stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use screenpilot_config::AppConfig;
use screenpilot_core::computer::{ComputerProvider, StartOptions};
use screenpilot_core::error::{Error, Result, SessionError};
use screenpilot_core::event::EventBus;
use screenpilot_core::provider::AiProvider;
use screenpilot_core::session::{Session, SessionStatus, SessionStore, Task};
use screenpilot_memory::{MemoryStore, TodoList};
use screenpilot_tools::{ComputerActionTool, TaskCompleteTool, task_registry};
use screenpilot_transport::{
    FamilyRules, HttpImageFetcher, ImageFetcher, PayloadBudget, RetryPolicy, TransportGuard,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::dispatcher::{ArgumentRepair, ModelArgumentRepair, ToolDispatcher};
use crate::loop_runner::StepLoop;

#[derive(Clone, Default)]
struct Scratch {
    memory: MemoryStore,
    todos: TodoList,
}

/// Build the transport guard described by `config`.
pub fn guard_from_config(config: &AppConfig, fetcher: Arc<dyn ImageFetcher>) -> TransportGuard {
    let t = &config.transport;
    TransportGuard::new(fetcher, config.image_cache_capacity())
        .with_rules(FamilyRules {
            count_bounded_prefixes: config.models.count_bounded_prefixes.clone(),
            byte_bounded_prefixes: config.models.byte_bounded_prefixes.clone(),
        })
        .with_budget(PayloadBudget {
            max_images: t.max_images,
            max_bytes: t.max_bytes,
            unresolved_image_bytes: t.unresolved_image_bytes,
        })
        .with_retry_policy(RetryPolicy::new(
            t.retry_max_attempts,
            Duration::from_millis(t.retry_initial_delay_ms),
        ))
}

pub struct SessionManager {
    config: AppConfig,
    store: Arc<dyn SessionStore>,
    computer: Arc<dyn ComputerProvider>,
    /// Plans steps and produces the final object
    ground: Arc<dyn AiProvider>,
    evaluator: Option<Arc<dyn AiProvider>>,
    guard: Arc<TransportGuard>,
    event_bus: Arc<EventBus>,
    repair: Option<Arc<dyn ArgumentRepair>>,
    scratch: RwLock<HashMap<String, Scratch>>,
}

impl SessionManager {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        computer: Arc<dyn ComputerProvider>,
        ground: Arc<dyn AiProvider>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let guard = Arc::new(guard_from_config(&config, fetcher));
        let repair: Option<Arc<dyn ArgumentRepair>> = config.models.repair_arguments.then(|| {
            Arc::new(ModelArgumentRepair::new(ground.clone(), guard.clone())) as Arc<dyn ArgumentRepair>
        });
        Self {
            config,
            store,
            computer,
            ground,
            evaluator: None,
            guard,
            event_bus: Arc::new(EventBus::default()),
            repair,
            scratch: RwLock::new(HashMap::new()),
        }
    }

    /// Like [`new`](Self::new), fetching images over HTTP.
    pub fn with_http_fetcher(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        computer: Arc<dyn ComputerProvider>,
        ground: Arc<dyn AiProvider>,
    ) -> Self {
        let timeout = Duration::from_secs(config.transport.fetch_timeout_secs);
        Self::new(config, store, computer, ground, Arc::new(HttpImageFetcher::new(timeout)))
    }

    /// Verify completion claims with a second model.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn AiProvider>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Replace (or with `None`, disable) argument repair.
    pub fn with_argument_repair(mut self, repair: Option<Arc<dyn ArgumentRepair>>) -> Self {
        self.repair = repair;
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Start a sandbox and register an idle session for it.
    pub async fn start_session(&self, options: Option<StartOptions>) -> Result<Session> {
        let mut session = Session::new();
        let options = options.or_else(|| {
            self.config.computer.initial_url.clone().map(|url| StartOptions {
                initial_url: Some(url),
                ..Default::default()
            })
        });

        let started = self.computer.start(&session.id, options).await?;
        session.provider_id = Some(started.provider_id);
        session.live_url = started.live_url;
        session.status = SessionStatus::Idle;

        self.store.insert(session.clone()).await?;
        self.scratch
            .write()
            .await
            .insert(session.id.clone(), Scratch::default());
        info!(session_id = %session.id, live_url = ?session.live_url, "Session started");
        Ok(session)
    }

    /// Run one task on an idle session and return its result.
    ///
    /// The task, with its logs, is appended to the session whether it
    /// succeeds or fails, and the session returns to idle either way.
    pub async fn execute_task(
        &self,
        session_id: &str,
        instructions: &str,
        output_schema: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.store.begin_task(session_id).await?;
        let mut task = Task::new(instructions, output_schema.clone());
        info!(session_id, task_id = %task.id, "Executing task");

        let scratch = self.scratch_for(session_id).await;
        let step_loop = self.step_loop(instructions, output_schema, scratch);

        let result = step_loop
            .run_with_log(session_id, instructions, &mut task.logs)
            .await;
        match &result {
            Ok(output) => task.complete(output.clone()),
            Err(e) => {
                warn!(session_id, task_id = %task.id, error = %e, "Task failed");
                task.fail(e.to_string());
            }
        }

        self.store.finish_task(session_id, task).await?;
        result
    }

    /// Stop the sandbox and mark the session stopped.
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        self.get_session(session_id).await?;
        self.computer.stop(session_id).await?;
        self.store.set_status(session_id, SessionStatus::Stopped).await?;
        self.scratch.write().await.remove(session_id);
        info!(session_id, "Session ended");
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| Error::Session(SessionError::NotFound(session_id.to_string())))
    }

    /// The session's memory store, if the session is live.
    pub async fn memory(&self, session_id: &str) -> Option<MemoryStore> {
        self.scratch.read().await.get(session_id).map(|s| s.memory.clone())
    }

    pub async fn todos(&self, session_id: &str) -> Option<TodoList> {
        self.scratch.read().await.get(session_id).map(|s| s.todos.clone())
    }

    async fn scratch_for(&self, session_id: &str) -> Scratch {
        self.scratch
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    fn step_loop(
        &self,
        instructions: &str,
        output_schema: Option<serde_json::Value>,
        scratch: Scratch,
    ) -> StepLoop {
        let agent = &self.config.agent;

        let mut completion = TaskCompleteTool::new(self.ground.clone(), self.guard.clone(), instructions)
            .with_output_schema(output_schema)
            .with_force_after(agent.force_complete_after)
            .with_max_images(agent.finalize_max_images);
        if let Some(evaluator) = &self.evaluator {
            completion = completion.with_evaluator(evaluator.clone());
        }

        let registry = task_registry(
            ComputerActionTool::new(self.computer.clone())
                .with_upload(self.config.computer.upload_screenshots),
            completion,
            scratch.memory,
            scratch.todos,
        );
        let mut dispatcher = ToolDispatcher::new(registry, self.event_bus.clone());
        if let Some(repair) = &self.repair {
            dispatcher = dispatcher.with_repair(repair.clone());
        }

        StepLoop::new(
            self.ground.clone(),
            self.computer.clone(),
            dispatcher,
            self.guard.clone(),
            self.event_bus.clone(),
        )
        .with_max_steps(agent.max_steps)
        .with_lookback(agent.lookback)
        .with_system_prompt(agent.system_prompt.clone())
        .with_upload_screenshots(self.config.computer.upload_screenshots)
    }
}
