//! Application state

use std::path::PathBuf;
use std::sync::Arc;

use fed_core::auth::{Resource, Rule};
use fed_core::blob::{BlobLifecycle, BlobStore, MemoryBlobStore};
use fed_core::member::{Organization, User};
use fed_core::registry::{FileRegistry, Registry};
use fed_core::service::TaskLifecycleService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: Arc<dyn Registry>,
    service: TaskLifecycleService,
}

impl AppState {
    /// Create a new AppState with the given data directory
    pub async fn new(data_dir: PathBuf) -> fed_core::Result<Self> {
        let registry_path = data_dir.join("registry.json");
        let registry: Arc<dyn Registry> = Arc::new(FileRegistry::new(registry_path).await?);
        let blob_store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        Self::with_stores(registry, blob_store).await
    }

    /// Create an AppState over explicit stores
    pub async fn with_stores(
        registry: Arc<dyn Registry>,
        blob_store: Arc<dyn BlobStore>,
    ) -> fed_core::Result<Self> {
        let state = Self {
            inner: Arc::new(AppStateInner {
                registry: Arc::clone(&registry),
                service: TaskLifecycleService::new(registry, BlobLifecycle::new(blob_store)),
            }),
        };
        state.bootstrap_root().await?;
        Ok(state)
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.inner.registry
    }

    pub fn service(&self) -> &TaskLifecycleService {
        &self.inner.service
    }

    /// Seed a root organization and user on first start
    ///
    /// The root user holds global rules on every resource; all further
    /// administration happens under that account.
    async fn bootstrap_root(&self) -> fed_core::Result<()> {
        if self.inner.registry.has_users().await? {
            return Ok(());
        }

        let username =
            std::env::var("FED_ROOT_USER").unwrap_or_else(|_| "root".to_string());
        let org = self
            .inner
            .registry
            .create_organization(Organization::new("root"))
            .await?;

        let mut user = User::new(username, org.id);
        for resource in [
            Resource::Organization,
            Resource::Collaboration,
            Resource::Task,
            Resource::Run,
            Resource::User,
        ] {
            user = user.with_rules(Rule::global_all(resource));
        }
        let user = self.inner.registry.create_user(user).await?;
        tracing::info!(user_id = %user.id, "bootstrapped root user");
        Ok(())
    }
}
