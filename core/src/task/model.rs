//! Task model definitions and status aggregation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run::Run;

/// Status of a task or of one of its runs
///
/// Tasks and runs share one status vocabulary; a task's status is derived
/// from its runs via [`aggregate_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Crashed,
    Unknown,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Crashed)
    }

    /// Terminal and unsuccessful
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Crashed)
    }
}

/// A unit of distributed computation spanning a collaboration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub collaboration_id: Uuid,
    /// Organization that initiated the task; must be a collaboration member
    pub init_org_id: Uuid,
    /// User that submitted the computation request, if known
    pub init_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>, collaboration_id: Uuid, init_org_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            collaboration_id,
            init_org_id,
            init_user_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_init_user(mut self, user_id: Uuid) -> Self {
        self.init_user_id = Some(user_id);
        self
    }
}

/// Derive a task's status from its runs
///
/// Any non-terminal run keeps the task non-terminal: `Active` if any run is
/// active, `Pending` otherwise. Once every run is terminal the task is
/// `Failed` if any run failed or crashed, else `Completed`. A task with no
/// runs yet is `Pending`.
pub fn aggregate_status(runs: &[Run]) -> TaskStatus {
    if runs.is_empty() {
        return TaskStatus::Pending;
    }

    if runs.iter().any(|r| !r.status.is_terminal()) {
        if runs.iter().any(|r| r.status == TaskStatus::Active) {
            return TaskStatus::Active;
        }
        return TaskStatus::Pending;
    }

    if runs.iter().any(|r| r.status.is_failure()) {
        TaskStatus::Failed
    } else {
        TaskStatus::Completed
    }
}
