//! Session, task and step-log types, plus the session store trait.
//!
//! A session is a long-lived handle to one remote computer environment that
//! hosts a sequence of tasks. At most one task runs per session at a time;
//! [`SessionStore::begin_task`] is the atomic check-and-set that enforces it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::SessionError;
use crate::provider::Usage;
use crate::tool::LogUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Queued,
    Running,
    Idle,
    Stopped,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Idle => "idle",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,

    /// Provider-side handle of the sandbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Live-view URL for watching the sandbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,

    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A new queued session with a generated id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Queued,
            provider_id: None,
            live_url: None,
            tasks: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub instructions: String,

    /// JSON Schema the final result must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,

    /// Opaque until the completion tool finalizes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    pub logs: Vec<AgentLog>,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(instructions: impl Into<String>, output_schema: Option<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            instructions: instructions.into(),
            output_schema,
            result: None,
            status: TaskStatus::Running,
            failure: None,
            logs: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn complete(&mut self, result: serde_json::Value) {
        self.result = Some(result);
        self.status = TaskStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
        self.status = TaskStatus::Failed;
        self.finished_at = Some(Utc::now());
    }
}

/// Self-reported planning fields attached to a step. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_step_evaluation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_goal: Option<String>,
}

impl PlanningData {
    pub fn is_empty(&self) -> bool {
        self.previous_step_evaluation.is_none()
            && self.current_reasoning.is_none()
            && self.next_goal.is_none()
    }
}

/// One record per step of the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLog {
    pub step: u32,
    pub timestamp: DateTime<Utc>,

    /// Representative screenshot reference for the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,

    /// The model's textual output
    #[serde(default)]
    pub model_output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning: Option<PlanningData>,

    /// Descriptions of the computer actions performed in this step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl AgentLog {
    pub fn new(step: u32) -> Self {
        Self {
            step,
            timestamp: Utc::now(),
            screenshot: None,
            model_output: String::new(),
            reasoning: None,
            usage: None,
            planning: None,
            actions: Vec::new(),
        }
    }

    /// Merge what a tool reported. Later screenshots replace earlier ones.
    pub fn apply(&mut self, update: LogUpdate) {
        if let Some(screenshot) = update.screenshot {
            self.screenshot = Some(screenshot);
        }
        if let Some(planning) = update.planning.filter(|p| !p.is_empty()) {
            self.planning = Some(planning);
        }
        if let Some(action) = update.action {
            self.actions.push(action);
        }
    }
}

/// Storage for sessions, keyed by id.
///
/// Implementations: in-memory (`screenpilot-memory`); an external store can
/// implement the same contract.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), SessionError>;

    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError>;

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), SessionError>;

    /// Atomically move an idle (or queued) session to running.
    ///
    /// Fails with [`SessionError::Busy`] when a task is already running and
    /// [`SessionError::Stopped`] once the session has ended.
    async fn begin_task(&self, session_id: &str) -> Result<(), SessionError>;

    /// Append a finished task and return the session to idle.
    async fn finish_task(&self, session_id: &str, task: Task) -> Result<(), SessionError>;

    async fn remove(&self, session_id: &str) -> Result<Option<Session>, SessionError>;
}
