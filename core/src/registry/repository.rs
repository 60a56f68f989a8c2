//! Registry trait
//!
//! Defines the storage interface for all persisted entities. The relational
//! store behind this trait is the single source of truth for tasks and runs;
//! `delete_task_with_runs` is the one atomic mutation the lifecycle service
//! relies on.

use async_trait::async_trait;
use uuid::Uuid;

use crate::member::{Collaboration, Organization, User};
use crate::run::{Run, RunUpdate};
use crate::task::Task;
use crate::Result;

/// Storage interface for organizations, collaborations, users, tasks and runs
#[async_trait]
pub trait Registry: Send + Sync {
    async fn create_organization(&self, org: Organization) -> Result<Organization>;

    /// Create a collaboration; requires at least two member organizations
    async fn create_collaboration(&self, col: Collaboration) -> Result<Collaboration>;

    async fn create_user(&self, user: User) -> Result<User>;

    /// Create a task; `init_org` must be a member of the collaboration
    async fn create_task(&self, task: Task) -> Result<Task>;

    async fn create_run(&self, run: Run) -> Result<Run>;

    async fn organization(&self, id: Uuid) -> Result<Option<Organization>>;

    async fn collaboration(&self, id: Uuid) -> Result<Option<Collaboration>>;

    async fn user(&self, id: Uuid) -> Result<Option<User>>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn task(&self, id: Uuid) -> Result<Option<Task>>;

    async fn run(&self, id: Uuid) -> Result<Option<Run>>;

    /// All runs belonging to a task
    async fn runs_for_task(&self, task_id: Uuid) -> Result<Vec<Run>>;

    /// Replace a stored run with the given one
    async fn update_run(&self, run: Run) -> Result<Run>;

    /// Apply a node-reported update to a run, atomically
    ///
    /// The terminal/monotonic guard is evaluated against the stored record
    /// inside the store's write boundary, so a report racing with another
    /// can never overwrite a run that has since become terminal. Returns
    /// `Conflict` from [`Run::apply`] and `NotFound` for an unknown run.
    async fn apply_run_update(&self, run_id: Uuid, update: RunUpdate) -> Result<Run>;

    /// Atomically delete a task together with all its runs
    ///
    /// Either the task row and every run row are removed, or none are, as
    /// observed by any concurrent reader. Returns `NotFound` if the task
    /// does not exist (including when it was deleted by a concurrent call).
    async fn delete_task_with_runs(&self, task_id: Uuid) -> Result<()>;

    /// Whether any user exists yet; used for first-start bootstrap
    async fn has_users(&self) -> Result<bool>;
}
