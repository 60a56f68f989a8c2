//! File-backed registry implementation
//!
//! Keeps all entities in one JSON document guarded by a single `RwLock`.
//! The write lock is the transaction boundary: mutations persist to disk
//! before the lock is released, so concurrent readers observe either the
//! whole mutation or none of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::Registry;
use crate::member::{Collaboration, Organization, User};
use crate::run::{Run, RunUpdate};
use crate::task::Task;
use crate::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryData {
    organizations: HashMap<Uuid, Organization>,
    collaborations: HashMap<Uuid, Collaboration>,
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
    runs: HashMap<Uuid, Run>,
}

/// File-based registry using a single JSON document
pub struct FileRegistry {
    path: PathBuf,
    cache: RwLock<RegistryData>,
}

impl FileRegistry {
    /// Create a new FileRegistry
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            RegistryData::default()
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Persist the given snapshot while the caller still holds the lock
    async fn persist(&self, data: &RegistryData) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

fn storage_error(what: &str, err: Error) -> Error {
    Error::Storage(format!("failed to persist {}: {}", what, err))
}

#[async_trait]
impl Registry for FileRegistry {
    async fn create_organization(&self, org: Organization) -> Result<Organization> {
        let mut cache = self.cache.write().await;
        if cache.organizations.contains_key(&org.id) {
            return Err(Error::InvalidInput(format!(
                "Organization with ID {} already exists",
                org.id
            )));
        }
        cache.organizations.insert(org.id, org.clone());
        if let Err(err) = self.persist(&cache).await {
            cache.organizations.remove(&org.id);
            return Err(storage_error("organization", err));
        }
        Ok(org)
    }

    async fn create_collaboration(&self, col: Collaboration) -> Result<Collaboration> {
        let mut cache = self.cache.write().await;
        if col.organization_ids.len() < 2 {
            return Err(Error::InvalidInput(
                "A collaboration requires at least two organizations".to_string(),
            ));
        }
        for org_id in &col.organization_ids {
            if !cache.organizations.contains_key(org_id) {
                return Err(Error::NotFound(format!("Organization {}", org_id)));
            }
        }
        cache.collaborations.insert(col.id, col.clone());
        if let Err(err) = self.persist(&cache).await {
            cache.collaborations.remove(&col.id);
            return Err(storage_error("collaboration", err));
        }
        Ok(col)
    }

    async fn create_user(&self, user: User) -> Result<User> {
        let mut cache = self.cache.write().await;
        if !cache.organizations.contains_key(&user.organization_id) {
            return Err(Error::NotFound(format!(
                "Organization {}",
                user.organization_id
            )));
        }
        if cache.users.values().any(|u| u.username == user.username) {
            return Err(Error::InvalidInput(format!(
                "Username {} is already taken",
                user.username
            )));
        }
        cache.users.insert(user.id, user.clone());
        if let Err(err) = self.persist(&cache).await {
            cache.users.remove(&user.id);
            return Err(storage_error("user", err));
        }
        Ok(user)
    }

    async fn create_task(&self, task: Task) -> Result<Task> {
        let mut cache = self.cache.write().await;
        let col = cache
            .collaborations
            .get(&task.collaboration_id)
            .ok_or_else(|| Error::NotFound(format!("Collaboration {}", task.collaboration_id)))?;
        if !col.has_member(task.init_org_id) {
            return Err(Error::InvalidInput(format!(
                "Organization {} is not a member of collaboration {}",
                task.init_org_id, task.collaboration_id
            )));
        }
        cache.tasks.insert(task.id, task.clone());
        if let Err(err) = self.persist(&cache).await {
            cache.tasks.remove(&task.id);
            return Err(storage_error("task", err));
        }
        Ok(task)
    }

    async fn create_run(&self, run: Run) -> Result<Run> {
        let mut cache = self.cache.write().await;
        if !cache.tasks.contains_key(&run.task_id) {
            return Err(Error::NotFound(format!("Task {}", run.task_id)));
        }
        cache.runs.insert(run.id, run.clone());
        if let Err(err) = self.persist(&cache).await {
            cache.runs.remove(&run.id);
            return Err(storage_error("run", err));
        }
        Ok(run)
    }

    async fn organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let cache = self.cache.read().await;
        Ok(cache.organizations.get(&id).cloned())
    }

    async fn collaboration(&self, id: Uuid) -> Result<Option<Collaboration>> {
        let cache = self.cache.read().await;
        Ok(cache.collaborations.get(&id).cloned())
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        let cache = self.cache.read().await;
        Ok(cache.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let cache = self.cache.read().await;
        Ok(cache.users.values().find(|u| u.username == username).cloned())
    }

    async fn task(&self, id: Uuid) -> Result<Option<Task>> {
        let cache = self.cache.read().await;
        Ok(cache.tasks.get(&id).cloned())
    }

    async fn run(&self, id: Uuid) -> Result<Option<Run>> {
        let cache = self.cache.read().await;
        Ok(cache.runs.get(&id).cloned())
    }

    async fn runs_for_task(&self, task_id: Uuid) -> Result<Vec<Run>> {
        let cache = self.cache.read().await;
        let mut runs: Vec<Run> = cache
            .runs
            .values()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }

    async fn update_run(&self, run: Run) -> Result<Run> {
        let mut cache = self.cache.write().await;
        if !cache.runs.contains_key(&run.id) {
            return Err(Error::NotFound(format!("Run {}", run.id)));
        }
        let previous = cache.runs.insert(run.id, run.clone());
        if let Err(err) = self.persist(&cache).await {
            if let Some(previous) = previous {
                cache.runs.insert(run.id, previous);
            }
            return Err(storage_error("run update", err));
        }
        Ok(run)
    }

    async fn apply_run_update(&self, run_id: Uuid, update: RunUpdate) -> Result<Run> {
        let mut cache = self.cache.write().await;

        let (previous, updated) = {
            let run = cache
                .runs
                .get_mut(&run_id)
                .ok_or_else(|| Error::NotFound(format!("Run {}", run_id)))?;
            let previous = run.clone();
            run.apply(update)?;
            (previous, run.clone())
        };

        if let Err(err) = self.persist(&cache).await {
            cache.runs.insert(run_id, previous);
            return Err(storage_error("run update", err));
        }

        Ok(updated)
    }

    async fn delete_task_with_runs(&self, task_id: Uuid) -> Result<()> {
        let mut cache = self.cache.write().await;

        let task = cache
            .tasks
            .remove(&task_id)
            .ok_or_else(|| Error::NotFound(format!("Task {}", task_id)))?;

        let run_ids: Vec<Uuid> = cache
            .runs
            .values()
            .filter(|r| r.task_id == task_id)
            .map(|r| r.id)
            .collect();
        let mut removed_runs = Vec::with_capacity(run_ids.len());
        for run_id in run_ids {
            if let Some(run) = cache.runs.remove(&run_id) {
                removed_runs.push(run);
            }
        }

        // Runs are gone before the task row; if persistence fails, restore
        // everything before releasing the lock so no partial cascade is
        // ever observable.
        if let Err(err) = self.persist(&cache).await {
            for run in removed_runs {
                cache.runs.insert(run.id, run);
            }
            cache.tasks.insert(task.id, task);
            return Err(Error::Storage(format!(
                "failed to persist task deletion: {}",
                err
            )));
        }

        Ok(())
    }

    async fn has_users(&self) -> Result<bool> {
        let cache = self.cache.read().await;
        Ok(!cache.users.is_empty())
    }
}
