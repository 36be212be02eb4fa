//! Computer provider trait and the action wire vocabulary.
//!
//! A computer provider drives one remote desktop or browser sandbox: it
//! starts and stops sessions, performs structured actions and captures
//! screenshots. Cloud sandbox / CDP implementations live outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{ComputerError, ToolError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Wheel,
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Wheel => "wheel",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A structured action the model asks the computer to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
    },
    DoubleClick {
        x: i32,
        y: i32,
    },
    Drag {
        path: Vec<Point>,
    },
    Keypress {
        keys: Vec<String>,
    },
    Move {
        x: i32,
        y: i32,
    },
    Scroll {
        x: i32,
        y: i32,
        scroll_x: i32,
        scroll_y: i32,
    },
    Type {
        text: String,
    },
    /// Pause for `duration` seconds.
    Wait {
        duration: f64,
    },
}

impl ComputerAction {
    /// The wire name of the action (`click`, `double_click`, …).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::DoubleClick { .. } => "double_click",
            Self::Drag { .. } => "drag",
            Self::Keypress { .. } => "keypress",
            Self::Move { .. } => "move",
            Self::Scroll { .. } => "scroll",
            Self::Type { .. } => "type",
            Self::Wait { .. } => "wait",
        }
    }

    /// Check the payload constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ToolError> {
        match self {
            Self::Drag { path } if path.len() < 2 => Err(ToolError::InvalidArguments(format!(
                "drag path needs at least 2 points, got {}",
                path.len()
            ))),
            Self::Keypress { keys } if keys.is_empty() => Err(ToolError::InvalidArguments(
                "keypress needs at least one key".into(),
            )),
            Self::Type { text } if text.is_empty() => Err(ToolError::InvalidArguments(
                "type text must not be empty".into(),
            )),
            Self::Wait { duration } if !duration.is_finite() || *duration < 0.0 => Err(
                ToolError::InvalidArguments(format!("wait duration must be >= 0, got {duration}")),
            ),
            Self::Click { .. }
            | Self::DoubleClick { .. }
            | Self::Drag { .. }
            | Self::Keypress { .. }
            | Self::Move { .. }
            | Self::Scroll { .. }
            | Self::Type { .. }
            | Self::Wait { .. } => Ok(()),
        }
    }

    /// Human-readable summary for step logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Click { x, y, button } => format!("click {button} at ({x}, {y})"),
            Self::DoubleClick { x, y } => format!("double_click at ({x}, {y})"),
            Self::Drag { path } => {
                let points: Vec<String> = path.iter().map(|p| format!("({}, {})", p.x, p.y)).collect();
                format!("drag along {}", points.join(" -> "))
            }
            Self::Keypress { keys } => format!("keypress {}", keys.join("+")),
            Self::Move { x, y } => format!("move to ({x}, {y})"),
            Self::Scroll { x, y, scroll_x, scroll_y } => {
                format!("scroll by ({scroll_x}, {scroll_y}) at ({x}, {y})")
            }
            Self::Type { text } => format!("type {} chars", text.chars().count()),
            Self::Wait { duration } => format!("wait {duration}s"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartOptions {
    /// URL to open once the sandbox is up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_url: Option<String>,

    /// Provider-specific settings
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Handle returned by [`ComputerProvider::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedSession {
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub base64: String,
    pub session_id: String,
    pub step: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    pub session_id: String,
    pub step: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// What the provider reports after performing an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    #[serde(rename = "type")]
    pub kind: String,
    pub action_performed: String,
    #[serde(default)]
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// The core computer provider trait.
#[async_trait]
pub trait ComputerProvider: Send + Sync {
    async fn start(
        &self,
        session_id: &str,
        options: Option<StartOptions>,
    ) -> Result<StartedSession, ComputerError>;

    async fn stop(&self, session_id: &str) -> Result<(), ComputerError>;

    async fn screen_size(&self) -> Result<ScreenSize, ComputerError>;

    /// Capture the screen as base64-encoded PNG.
    async fn take_screenshot(&self, session_id: &str) -> Result<String, ComputerError>;

    /// Upload a screenshot and return its URL.
    ///
    /// Providers without upload storage return `Ok(None)` and the caller
    /// inlines the image instead.
    async fn upload_screenshot(&self, _request: UploadRequest) -> Result<Option<String>, ComputerError> {
        Ok(None)
    }

    async fn perform_action(
        &self,
        action: &ComputerAction,
        context: ActionContext,
    ) -> Result<ActionOutcome, ComputerError>;

    async fn navigate_to(&self, session_id: &str, url: &str) -> Result<(), ComputerError>;

    async fn current_url(&self, session_id: &str) -> Result<Option<String>, ComputerError>;

    /// Reattach to a previously started sandbox.
    async fn restore_session(
        &self,
        _session_id: &str,
        _handle: &StartedSession,
    ) -> Result<(), ComputerError> {
        Err(ComputerError::Unsupported("restore_session".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_parses_from_wire_format() {
        let action: ComputerAction =
            serde_json::from_value(serde_json::json!({"type": "click", "x": 100, "y": 50, "button": "left"}))
                .unwrap();
        assert_eq!(action, ComputerAction::Click { x: 100, y: 50, button: MouseButton::Left });
        assert_eq!(action.kind(), "click");
        assert!(action.validate().is_ok());
    }

    #[test]
    fn button_defaults_to_left() {
        let action: ComputerAction =
            serde_json::from_value(serde_json::json!({"type": "click", "x": 1, "y": 2})).unwrap();
        assert!(matches!(action, ComputerAction::Click { button: MouseButton::Left, .. }));
    }

    #[test]
    fn drag_needs_two_points() {
        let action = ComputerAction::Drag { path: vec![Point { x: 0, y: 0 }] };
        assert!(matches!(action.validate(), Err(ToolError::InvalidArguments(_))));

        let action = ComputerAction::Drag {
            path: vec![Point { x: 0, y: 0 }, Point { x: 5, y: 5 }],
        };
        assert!(action.validate().is_ok());
        assert_eq!(action.describe(), "drag along (0, 0) -> (5, 5)");
    }

    #[test]
    fn empty_type_and_negative_wait_rejected() {
        assert!(ComputerAction::Type { text: String::new() }.validate().is_err());
        assert!(ComputerAction::Wait { duration: -1.0 }.validate().is_err());
        assert!(ComputerAction::Wait { duration: 0.0 }.validate().is_ok());
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let parsed: Result<ComputerAction, _> =
            serde_json::from_value(serde_json::json!({"type": "teleport", "x": 1}));
        assert!(parsed.is_err());
    }

    #[test]
    fn outcome_uses_type_key() {
        let outcome = ActionOutcome {
            kind: "click".into(),
            action_performed: "Clicked".into(),
            reasoning: String::new(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "click");
    }
}
