//! Task lifecycle service
//!
//! Orchestrates authorization, status aggregation and the cascade delete.
//! Every call takes the principal explicitly; there is no ambient session.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{is_allowed, Operation, Resource, ResourceContext};
use crate::blob::BlobLifecycle;
use crate::member::User;
use crate::registry::Registry;
use crate::run::{Run, RunUpdate};
use crate::task::{aggregate_status, Task, TaskStatus};
use crate::{Error, Result};

/// Request to create a task and fan it out across a collaboration
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub collaboration_id: Uuid,
    /// Initiating organization; defaults to the principal's organization
    pub init_org_id: Option<Uuid>,
    pub input: Option<String>,
}

pub struct TaskLifecycleService {
    registry: Arc<dyn Registry>,
    blobs: BlobLifecycle,
}

impl TaskLifecycleService {
    pub fn new(registry: Arc<dyn Registry>, blobs: BlobLifecycle) -> Self {
        Self { registry, blobs }
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Aggregate status of a task
    ///
    /// `NotFound` if the task does not exist, `Forbidden` if the principal
    /// holds no matching view rule.
    pub async fn get_status(&self, principal: &User, task_id: Uuid) -> Result<TaskStatus> {
        let task = self.load_task(task_id).await?;
        let ctx = self.task_context(&task).await?;

        if !is_allowed(principal, Operation::View, Resource::Task, &ctx) {
            return Err(Error::Forbidden(format!(
                "user {} may not view task {}",
                principal.username, task_id
            )));
        }

        let runs = self.registry.runs_for_task(task_id).await?;
        Ok(aggregate_status(&runs))
    }

    /// A task with its runs, for detail views
    pub async fn get_task(&self, principal: &User, task_id: Uuid) -> Result<(Task, Vec<Run>)> {
        let task = self.load_task(task_id).await?;
        let ctx = self.task_context(&task).await?;

        if !is_allowed(principal, Operation::View, Resource::Task, &ctx) {
            return Err(Error::Forbidden(format!(
                "user {} may not view task {}",
                principal.username, task_id
            )));
        }

        let runs = self.registry.runs_for_task(task_id).await?;
        Ok((task, runs))
    }

    /// Create a task and fan out one pending run per member organization
    pub async fn create_task(&self, principal: &User, req: NewTask) -> Result<(Task, Vec<Run>)> {
        let col = self
            .registry
            .collaboration(req.collaboration_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Collaboration {}", req.collaboration_id)))?;

        let init_org_id = req.init_org_id.unwrap_or(principal.organization_id);
        if !col.has_member(init_org_id) {
            return Err(Error::InvalidInput(format!(
                "Organization {} is not a member of collaboration {}",
                init_org_id, col.id
            )));
        }

        let ctx = ResourceContext::new()
            .owned_by(init_org_id)
            .in_collaboration(col.organization_ids.clone())
            .created_by(principal.id);
        if !is_allowed(principal, Operation::Create, Resource::Task, &ctx) {
            return Err(Error::Forbidden(format!(
                "user {} may not create tasks in collaboration {}",
                principal.username, col.id
            )));
        }

        let task = self
            .registry
            .create_task(Task::new(req.name, col.id, init_org_id).with_init_user(principal.id))
            .await?;

        let mut runs = Vec::with_capacity(col.organization_ids.len());
        for org_id in &col.organization_ids {
            let mut run = Run::new(task.id, *org_id);
            if let Some(input) = &req.input {
                run = run.with_input(input.clone());
            }
            runs.push(self.registry.create_run(run).await?);
        }

        info!(task_id = %task.id, runs = runs.len(), "created task");
        Ok((task, runs))
    }

    /// Apply a compute node's status report to a run
    pub async fn report_run(
        &self,
        principal: &User,
        run_id: Uuid,
        update: RunUpdate,
    ) -> Result<Run> {
        let run = self
            .registry
            .run(run_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Run {}", run_id)))?;
        let task = self.load_task(run.task_id).await?;

        let ctx = self
            .task_context(&task)
            .await?
            .owned_by(run.organization_id);
        if !is_allowed(principal, Operation::Edit, Resource::Run, &ctx) {
            return Err(Error::Forbidden(format!(
                "user {} may not edit run {}",
                principal.username, run_id
            )));
        }

        // The terminal/monotonic guard runs against the stored record
        // inside the registry's write boundary, not against the snapshot
        // loaded above: a report racing with another cannot revert a run
        // that has become terminal in the meantime.
        self.registry.apply_run_update(run_id, update).await
    }

    /// Delete a task together with all its runs and their stored results
    ///
    /// Blob cleanups are attempted first, best-effort; the registry cascade
    /// then commits as one atomic mutation. A storage failure rolls the
    /// cascade back entirely and surfaces as `Storage`.
    pub async fn delete_task(&self, principal: &User, task_id: Uuid) -> Result<()> {
        let task = self.load_task(task_id).await?;
        let ctx = self.task_context(&task).await?;

        if !is_allowed(principal, Operation::Delete, Resource::Task, &ctx) {
            return Err(Error::Forbidden(format!(
                "user {} may not delete task {}",
                principal.username, task_id
            )));
        }

        let runs = self.registry.runs_for_task(task_id).await?;
        let mut orphaned = 0usize;
        for run in &runs {
            if !self.blobs.cleanup(run).await {
                orphaned += 1;
            }
        }
        if orphaned > 0 {
            warn!(
                task_id = %task_id,
                orphaned,
                "task deletion proceeding with orphaned result blobs"
            );
        }

        self.registry.delete_task_with_runs(task_id).await?;

        info!(task_id = %task_id, runs = runs.len(), "deleted task and its runs");
        Ok(())
    }

    async fn load_task(&self, task_id: Uuid) -> Result<Task> {
        self.registry
            .task(task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Task {}", task_id)))
    }

    /// Ownership descriptor for authorization checks against a task
    async fn task_context(&self, task: &Task) -> Result<ResourceContext> {
        let members = self
            .registry
            .collaboration(task.collaboration_id)
            .await?
            .map(|col| col.organization_ids)
            .unwrap_or_default();

        let mut ctx = ResourceContext::new()
            .owned_by(task.init_org_id)
            .in_collaboration(members);
        if let Some(user_id) = task.init_user_id {
            ctx = ctx.created_by(user_id);
        }
        Ok(ctx)
    }
}
