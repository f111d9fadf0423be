/// Task CRUD endpoints
use crate::{
    api::{data, empty, ApiJson, DataBody},
    auth::AuthSession,
    context::AppContext,
    db::time::Task,
    error::{ApiError, ApiResult, ErrorCode},
    validation,
};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskRequest {
    pub task_id: i64,
    pub name: String,
    pub common: bool,
    pub rate: Option<f64>,
    pub billable: bool,
}

impl Default for TaskRequest {
    fn default() -> Self {
        Self {
            task_id: 0,
            name: String::new(),
            common: false,
            rate: None,
            billable: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskIdRequest {
    pub task_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    pub billable: bool,
    pub common: bool,
    pub active: bool,
}

impl TaskResponse {
    fn new(task: &Task) -> Self {
        Self {
            id: task.task_id,
            name: task.task_name.clone(),
            rate: task.default_rate,
            billable: task.default_billable,
            common: task.common,
            active: task.task_active,
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(save_task).put(update_task).delete(delete_task))
        .route("/all", get(get_all_tasks))
        .route("/archived", get(get_archived_tasks))
        .route("/archive", put(archive_task))
        .route("/restore", put(restore_task))
        .route("/:taskId", get(get_task))
}

async fn get_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Path(task_id): Path<String>,
) -> ApiResult<Json<DataBody<TaskResponse>>> {
    let task_id = task_id
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::field(ErrorCode::InvalidField, "Invalid id", "taskId"))?;

    let task = ctx
        .tasks
        .task(task_id, session.auth.account.account_id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidTask, "Task not found"))?;

    Ok(data(TaskResponse::new(&task)))
}

async fn get_all_tasks(
    State(ctx): State<AppContext>,
    session: AuthSession,
) -> ApiResult<Json<DataBody<Vec<TaskResponse>>>> {
    let tasks = ctx
        .tasks
        .tasks(session.auth.account.account_id, true)
        .await?;

    Ok(data(tasks.iter().map(TaskResponse::new).collect()))
}

async fn get_archived_tasks(
    State(ctx): State<AppContext>,
    session: AuthSession,
) -> ApiResult<Json<DataBody<Vec<TaskResponse>>>> {
    let tasks = ctx
        .tasks
        .tasks(session.auth.account.account_id, false)
        .await?;

    Ok(data(tasks.iter().map(TaskResponse::new).collect()))
}

async fn save_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<TaskRequest>,
) -> ApiResult<Json<DataBody<TaskResponse>>> {
    if !validation::is_length(
        &request.name,
        validation::NAME_MIN_LENGTH,
        validation::NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Task name must be between 1 and 64 characters",
            "name",
        ));
    }

    let task = ctx
        .tasks
        .save_task(
            session.auth.account.account_id,
            &request.name,
            request.common,
            request.rate,
            request.billable,
        )
        .await?;

    Ok(data(TaskResponse::new(&task)))
}

async fn update_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<TaskRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.task_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidTask, "Missing taskId", "taskId"));
    }

    if !validation::is_length(
        &request.name,
        validation::NAME_MIN_LENGTH,
        validation::NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Task name must be between 1 and 64 characters",
            "name",
        ));
    }

    ctx.tasks
        .update_task(&Task {
            task_id: request.task_id,
            account_id: session.auth.account.account_id,
            task_name: request.name,
            default_rate: request.rate,
            default_billable: request.billable,
            common: request.common,
            task_active: true,
        })
        .await?;

    Ok(empty())
}

async fn archive_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<TaskIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.task_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidTask, "Missing taskId", "taskId"));
    }

    ctx.tasks
        .set_task_active(request.task_id, session.auth.account.account_id, false)
        .await?;

    Ok(empty())
}

async fn restore_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<TaskIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.task_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidTask, "Missing taskId", "taskId"));
    }

    ctx.tasks
        .set_task_active(request.task_id, session.auth.account.account_id, true)
        .await?;

    Ok(empty())
}

async fn delete_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<TaskIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.task_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidTask, "Missing taskId", "taskId"));
    }

    ctx.tasks
        .delete_task(request.task_id, session.auth.account.account_id)
        .await?;

    Ok(empty())
}
