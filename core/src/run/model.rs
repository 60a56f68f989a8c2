//! Run model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskStatus;
use crate::{Error, Result};

/// One organization's execution of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub task_id: Uuid,
    pub organization_id: Uuid,
    pub status: TaskStatus,
    /// Opaque reference to the stored result (content hash or URI)
    pub result: Option<String>,
    pub input: Option<String>,
    pub log: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether the result lives in external blob storage
    pub blob_storage_used: bool,
    pub created_at: DateTime<Utc>,
}

impl Run {
    pub fn new(task_id: Uuid, organization_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            organization_id,
            status: TaskStatus::default(),
            result: None,
            input: None,
            log: None,
            started_at: None,
            finished_at: None,
            blob_storage_used: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }

    pub fn with_blob_storage(mut self, used: bool) -> Self {
        self.blob_storage_used = used;
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a node-reported update
    ///
    /// Rejected with `Conflict` once the run is terminal; status moves are
    /// monotonic forward (no reversal from active back to pending). Applying
    /// an active status stamps `started_at`, a terminal status stamps
    /// `finished_at`, when not already set.
    pub fn apply(&mut self, update: RunUpdate) -> Result<()> {
        if self.is_terminal() {
            return Err(Error::Conflict(format!(
                "run {} is already in terminal status {:?}",
                self.id, self.status
            )));
        }

        if let Some(status) = update.status {
            // Unknown is an administrative reset, reachable from any
            // non-terminal status.
            if status != TaskStatus::Unknown && status_rank(status) < status_rank(self.status) {
                return Err(Error::Conflict(format!(
                    "run {} cannot move from {:?} back to {:?}",
                    self.id, self.status, status
                )));
            }
            if status == TaskStatus::Active && self.started_at.is_none() {
                self.started_at = Some(Utc::now());
            }
            if status.is_terminal() && self.finished_at.is_none() {
                self.finished_at = Some(Utc::now());
            }
            self.status = status;
        }

        if let Some(result) = update.result {
            self.result = Some(result);
        }
        if let Some(log) = update.log {
            self.log = Some(log);
        }
        if let Some(used) = update.blob_storage_used {
            self.blob_storage_used = used;
        }

        Ok(())
    }
}

// Unknown ranks with pending: an administrative reset, applicable to any
// non-terminal run.
fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Pending | TaskStatus::Unknown => 0,
        TaskStatus::Active => 1,
        TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Crashed => 2,
    }
}

/// Partial update reported by a compute node
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunUpdate {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub blob_storage_used: Option<bool>,
}
