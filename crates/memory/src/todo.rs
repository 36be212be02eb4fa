//! Ordered todo list the model maintains through the `todo` tool.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub description: String,
    pub status: TodoStatus,
}

/// Partial update of an existing item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoUpdate {
    pub id: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TodoStatus>,
}

#[derive(Debug, Default)]
struct Inner {
    items: Vec<TodoItem>,
    next_id: u64,
}

/// Session-scoped todo list. Ids start at 1 and never repeat.
#[derive(Debug, Clone, Default)]
pub struct TodoList {
    inner: Arc<RwLock<Inner>>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append new items; returns them with their assigned ids.
    pub async fn add(&self, entries: Vec<(String, TodoStatus)>) -> Vec<TodoItem> {
        let mut inner = self.inner.write().await;
        let mut added = Vec::with_capacity(entries.len());
        for (description, status) in entries {
            inner.next_id += 1;
            let item = TodoItem {
                id: inner.next_id,
                description,
                status,
            };
            inner.items.push(item.clone());
            added.push(item);
        }
        added
    }

    /// Apply updates; ids that don't exist are skipped. Returns the ids
    /// actually updated.
    pub async fn update(&self, updates: Vec<TodoUpdate>) -> Vec<u64> {
        let mut inner = self.inner.write().await;
        let mut applied = Vec::new();
        for update in updates {
            let Some(item) = inner.items.iter_mut().find(|i| i.id == update.id) else {
                debug!(id = update.id, "Skipping update of unknown todo");
                continue;
            };
            if let Some(description) = update.description {
                item.description = description;
            }
            if let Some(status) = update.status {
                item.status = status;
            }
            applied.push(update.id);
        }
        applied
    }

    pub async fn list(&self) -> Vec<TodoItem> {
        self.inner.read().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.items.is_empty()
    }
}
