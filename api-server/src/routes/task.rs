//! Task API endpoints
//!
//! Status retrieval, creation and cascading deletion of tasks.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fed_core::run::Run;
use fed_core::service::NewTask;
use fed_core::task::{Task, TaskStatus};

use super::{map_core_error, ErrorResponse, RouteError};
use crate::auth::principal_from_headers;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub name: String,
    pub collaboration_id: Uuid,
    #[serde(default)]
    pub init_org_id: Option<Uuid>,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub msg: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub name: String,
    pub collaboration_id: Uuid,
    pub init_org_id: Uuid,
    pub init_user_id: Option<Uuid>,
    pub created_at: String,
    pub runs: Vec<RunResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub id: Uuid,
    pub task_id: Uuid,
    pub organization_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub blob_storage_used: bool,
}

impl From<Run> for RunResponse {
    fn from(run: Run) -> Self {
        Self {
            id: run.id,
            task_id: run.task_id,
            organization_id: run.organization_id,
            status: run.status,
            result: run.result,
            started_at: run.started_at.map(|t| t.to_rfc3339()),
            finished_at: run.finished_at.map(|t| t.to_rfc3339()),
            blob_storage_used: run.blob_storage_used,
        }
    }
}

fn task_response(task: Task, runs: Vec<Run>) -> TaskResponse {
    TaskResponse {
        id: task.id,
        name: task.name,
        collaboration_id: task.collaboration_id,
        init_org_id: task.init_org_id,
        init_user_id: task.init_user_id,
        created_at: task.created_at.to_rfc3339(),
        runs: runs.into_iter().map(RunResponse::from).collect(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/task/:id/status - Aggregate status of a task
async fn get_task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, RouteError> {
    let principal = principal_from_headers(&state, &headers).await?;
    let status = state
        .service()
        .get_status(&principal, id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(StatusResponse { status }))
}

/// GET /api/task/:id - Task detail with its runs
async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, RouteError> {
    let principal = principal_from_headers(&state, &headers).await?;
    let (task, runs) = state
        .service()
        .get_task(&principal, id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(task_response(task, runs)))
}

/// POST /api/task - Create a task and fan out runs
async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), RouteError> {
    if req.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Name cannot be empty".to_string(),
            }),
        ));
    }

    let principal = principal_from_headers(&state, &headers).await?;
    let (task, runs) = state
        .service()
        .create_task(
            &principal,
            NewTask {
                name: req.name,
                collaboration_id: req.collaboration_id,
                init_org_id: req.init_org_id,
                input: req.input,
            },
        )
        .await
        .map_err(map_core_error)?;

    Ok((StatusCode::CREATED, Json(task_response(task, runs))))
}

/// DELETE /api/task/:id - Delete a task, its runs and their stored results
async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, RouteError> {
    let principal = principal_from_headers(&state, &headers).await?;
    state
        .service()
        .delete_task(&principal, id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeleteResponse {
        msg: format!("Task {} and its runs were deleted", id),
    }))
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/task", post(create_task))
        .route("/api/task/{id}", get(get_task).delete(delete_task))
        .route("/api/task/{id}/status", get(get_task_status))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    use fed_core::auth::{Operation, Resource, Rule, Scope};
    use fed_core::blob::{BlobStore, MemoryBlobStore};
    use fed_core::member::{Collaboration, Organization, User};
    use fed_core::registry::{FileRegistry, Registry};
    use fed_core::run::Run;
    use fed_core::task::{Task, TaskStatus};

    use crate::auth::issue_user_jwt;
    use crate::state::AppState;

    struct TestServer {
        state: AppState,
        registry: Arc<dyn Registry>,
        blob_store: Arc<MemoryBlobStore>,
        _temp_dir: TempDir,
    }

    async fn build_server() -> TestServer {
        let temp_dir = TempDir::new().unwrap();
        let registry: Arc<dyn Registry> = Arc::new(
            FileRegistry::new(temp_dir.path().join("registry.json"))
                .await
                .unwrap(),
        );
        let blob_store = Arc::new(MemoryBlobStore::new());
        let state = AppState::with_stores(
            Arc::clone(&registry),
            Arc::clone(&blob_store) as Arc<dyn BlobStore>,
        )
        .await
        .unwrap();
        TestServer {
            state,
            registry,
            blob_store,
            _temp_dir: temp_dir,
        }
    }

    impl TestServer {
        /// Task with an active run and a completed blob-backed run
        async fn seed_task(&self) -> (Task, Run, Run, String) {
            let org_a = self
                .registry
                .create_organization(Organization::new("org-a"))
                .await
                .unwrap();
            let org_b = self
                .registry
                .create_organization(Organization::new("org-b"))
                .await
                .unwrap();
            let col = self
                .registry
                .create_collaboration(Collaboration::new("pair", vec![org_a.id, org_b.id]))
                .await
                .unwrap();
            let task = self
                .registry
                .create_task(Task::new("average", col.id, org_a.id))
                .await
                .unwrap();
            let run_a = self
                .registry
                .create_run(Run::new(task.id, org_a.id).with_status(TaskStatus::Active))
                .await
                .unwrap();
            let reference = format!("sha256:{}", Uuid::new_v4());
            self.blob_store.put(reference.clone(), vec![42]).await;
            let run_b = self
                .registry
                .create_run(
                    Run::new(task.id, org_b.id)
                        .with_status(TaskStatus::Completed)
                        .with_result(reference.clone())
                        .with_blob_storage(true),
                )
                .await
                .unwrap();
            (task, run_a, run_b, reference)
        }

        async fn token_for_rules(&self, rules: Vec<Rule>) -> String {
            let org = self
                .registry
                .create_organization(Organization::new(format!("org-{}", Uuid::new_v4())))
                .await
                .unwrap();
            let user = self
                .registry
                .create_user(
                    User::new(format!("user-{}", Uuid::new_v4()), org.id).with_rules(rules),
                )
                .await
                .unwrap();
            issue_user_jwt(user.id, 1).unwrap().0
        }
    }

    async fn send(
        state: AppState,
        method: &str,
        uri: String,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let app = super::router().with_state(state);
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, payload)
    }

    #[tokio::test]
    async fn get_status_with_global_view_rule() {
        let server = build_server().await;
        let (task, _, _, _) = server.seed_task().await;
        let token = server
            .token_for_rules(vec![Rule::new(Resource::Task, Scope::Global, Operation::View)])
            .await;

        let (status, payload) = send(
            server.state.clone(),
            "GET",
            format!("/api/task/{}/status", task.id),
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        // The active run dominates the completed one
        assert_eq!(payload["status"], "active");
    }

    #[tokio::test]
    async fn get_status_without_rule_is_forbidden() {
        let server = build_server().await;
        let (task, _, _, _) = server.seed_task().await;
        let token = server.token_for_rules(vec![]).await;

        let (status, _) = send(
            server.state.clone(),
            "GET",
            format!("/api/task/{}/status", task.id),
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn get_status_without_token_is_unauthorized() {
        let server = build_server().await;
        let (task, _, _, _) = server.seed_task().await;

        let (status, _) = send(
            server.state.clone(),
            "GET",
            format!("/api/task/{}/status", task.id),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn get_status_of_missing_task_is_not_found() {
        let server = build_server().await;
        let token = server
            .token_for_rules(vec![Rule::new(Resource::Task, Scope::Global, Operation::View)])
            .await;

        let (status, _) = send(
            server.state.clone(),
            "GET",
            format!("/api/task/{}/status", Uuid::new_v4()),
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_task_cascades_runs_and_blobs() {
        let server = build_server().await;
        let (task, run_a, run_b, reference) = server.seed_task().await;
        let token = server
            .token_for_rules(vec![Rule::new(
                Resource::Task,
                Scope::Global,
                Operation::Delete,
            )])
            .await;

        let (status, _) = send(
            server.state.clone(),
            "DELETE",
            format!("/api/task/{}", task.id),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert!(server.registry.task(task.id).await.unwrap().is_none());
        assert!(server.registry.run(run_a.id).await.unwrap().is_none());
        assert!(server.registry.run(run_b.id).await.unwrap().is_none());
        assert!(!server.blob_store.contains(&reference).await);

        // A second delete finds nothing
        let (status, _) = send(
            server.state.clone(),
            "DELETE",
            format!("/api/task/{}", task.id),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_task_with_view_rule_only_is_forbidden() {
        let server = build_server().await;
        let (task, run_a, run_b, reference) = server.seed_task().await;
        let token = server
            .token_for_rules(vec![Rule::new(Resource::Task, Scope::Global, Operation::View)])
            .await;

        let (status, _) = send(
            server.state.clone(),
            "DELETE",
            format!("/api/task/{}", task.id),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // No state change
        assert!(server.registry.task(task.id).await.unwrap().is_some());
        assert!(server.registry.run(run_a.id).await.unwrap().is_some());
        assert!(server.registry.run(run_b.id).await.unwrap().is_some());
        assert!(server.blob_store.contains(&reference).await);
    }

    #[tokio::test]
    async fn blob_store_failure_does_not_block_delete() {
        let server = build_server().await;
        let (task, _, _, reference) = server.seed_task().await;

        // The blob is gone already; its deletion will fail and be logged
        server.blob_store.delete(&reference).await.unwrap();

        let token = server
            .token_for_rules(vec![Rule::new(
                Resource::Task,
                Scope::Global,
                Operation::Delete,
            )])
            .await;
        let (status, _) = send(
            server.state.clone(),
            "DELETE",
            format!("/api/task/{}", task.id),
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(server.registry.task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_task_fans_out_runs_over_http() {
        let server = build_server().await;
        let org_a = server
            .registry
            .create_organization(Organization::new("org-a"))
            .await
            .unwrap();
        let org_b = server
            .registry
            .create_organization(Organization::new("org-b"))
            .await
            .unwrap();
        let col = server
            .registry
            .create_collaboration(Collaboration::new("pair", vec![org_a.id, org_b.id]))
            .await
            .unwrap();
        let user = server
            .registry
            .create_user(
                User::new("creator", org_a.id).with_rule(Rule::new(
                    Resource::Task,
                    Scope::Collaboration,
                    Operation::Create,
                )),
            )
            .await
            .unwrap();
        let token = issue_user_jwt(user.id, 1).unwrap().0;

        let body = serde_json::json!({
            "name": "average",
            "collaborationId": col.id,
        });
        let app = super::router().with_state(server.state.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/task")
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["runs"].as_array().unwrap().len(), 2);
        assert!(payload["runs"]
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["status"] == "pending"));
    }
}
