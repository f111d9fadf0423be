/// Project CRUD and the copy-forward of last week's projects
use crate::{
    api::{data, empty, time::TimeRangeResponse, ApiJson, DataBody},
    auth::AuthSession,
    clients::{ProjectData, ProjectTaskData},
    context::AppContext,
    db::time::Project,
    error::{ApiError, ApiResult, ErrorCode},
    validation,
};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectTaskRequest {
    pub task_id: i64,
    pub rate: Option<f64>,
    pub billable: bool,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectRequest {
    pub project_id: i64,
    pub client_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub active: bool,
    pub tasks: Vec<ProjectTaskRequest>,
}

impl Default for ProjectRequest {
    fn default() -> Self {
        Self {
            project_id: 0,
            client_id: 0,
            name: String::new(),
            code: None,
            active: true,
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectIdRequest {
    pub project_id: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StartAndEndDateRequest {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTaskResponse {
    pub task_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    pub billable: bool,
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub active: bool,
    pub tasks: Vec<ProjectTaskResponse>,
}

impl ProjectResponse {
    fn new(project: &Project) -> Self {
        Self {
            id: project.project_id,
            client_id: project.client_id,
            client_name: project.client_name.clone(),
            name: project.project_name.clone(),
            code: project.code.clone(),
            active: project.project_active,
            tasks: project
                .tasks
                .iter()
                .map(|task| ProjectTaskResponse {
                    task_id: task.task_id,
                    name: task.task_name.clone(),
                    rate: task.rate,
                    billable: task.billable,
                    active: task.active,
                })
                .collect(),
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(create_project).put(update_project).delete(delete_project))
        .route("/all", get(get_all_projects))
        .route("/archived", get(get_archived_projects))
        .route("/archive", put(archive_project))
        .route("/restore", put(restore_project))
        .route("/copy/last/week", post(copy_projects_from_last_week))
        .route("/:projectId", get(get_project))
}

fn validate_project_request(request: &ProjectRequest) -> ApiResult<()> {
    if request.client_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidClient, "Missing clientId", "clientId"));
    }

    if !validation::is_length(
        &request.name,
        validation::PROJECT_NAME_MIN_LENGTH,
        validation::PROJECT_NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Project name must be between 1 and 128 characters",
            "name",
        ));
    }

    for task in &request.tasks {
        if task.task_id <= 0 {
            return Err(ApiError::field(ErrorCode::InvalidTask, "Missing taskId", "taskId"));
        }
    }

    Ok(())
}

fn project_data(request: ProjectRequest) -> ProjectData {
    ProjectData {
        client_id: request.client_id,
        project_name: request.name,
        code: request.code,
        project_active: request.active,
        tasks: request
            .tasks
            .into_iter()
            .map(|task| ProjectTaskData {
                task_id: task.task_id,
                rate: task.rate,
                billable: task.billable,
                active: task.active,
            })
            .collect(),
    }
}

async fn get_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Path(project_id): Path<String>,
) -> ApiResult<Json<DataBody<ProjectResponse>>> {
    let project_id = project_id
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::field(ErrorCode::InvalidField, "Invalid id", "projectId"))?;

    let project = ctx
        .clients
        .project(project_id, session.auth.account.account_id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidProject, "No project found"))?;

    Ok(data(ProjectResponse::new(&project)))
}

async fn get_all_projects(
    State(ctx): State<AppContext>,
    session: AuthSession,
) -> ApiResult<Json<DataBody<Vec<ProjectResponse>>>> {
    let projects = ctx
        .clients
        .projects(session.auth.account.account_id, true)
        .await?;

    Ok(data(projects.iter().map(ProjectResponse::new).collect()))
}

async fn get_archived_projects(
    State(ctx): State<AppContext>,
    session: AuthSession,
) -> ApiResult<Json<DataBody<Vec<ProjectResponse>>>> {
    let projects = ctx
        .clients
        .projects(session.auth.account.account_id, false)
        .await?;

    Ok(data(projects.iter().map(ProjectResponse::new).collect()))
}

async fn create_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProjectRequest>,
) -> ApiResult<Json<DataBody<ProjectResponse>>> {
    validate_project_request(&request)?;

    let project = ctx
        .clients
        .create_project(session.auth.account.account_id, &project_data(request))
        .await?;

    Ok(data(ProjectResponse::new(&project)))
}

async fn update_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProjectRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.project_id <= 0 {
        return Err(ApiError::field(
            ErrorCode::InvalidProject,
            "Missing projectId",
            "projectId",
        ));
    }
    validate_project_request(&request)?;

    let project_id = request.project_id;
    ctx.clients
        .update_project(
            project_id,
            session.auth.account.account_id,
            &project_data(request),
        )
        .await?;

    Ok(empty())
}

async fn archive_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProjectIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.project_id <= 0 {
        return Err(ApiError::field(
            ErrorCode::InvalidProject,
            "Missing projectId",
            "projectId",
        ));
    }

    ctx.clients
        .set_project_active(request.project_id, session.auth.account.account_id, false)
        .await?;

    Ok(empty())
}

async fn restore_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProjectIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.project_id <= 0 {
        return Err(ApiError::field(
            ErrorCode::InvalidProject,
            "Missing projectId",
            "projectId",
        ));
    }

    ctx.clients
        .set_project_active(request.project_id, session.auth.account.account_id, true)
        .await?;

    Ok(empty())
}

async fn delete_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProjectIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.project_id <= 0 {
        return Err(ApiError::field(
            ErrorCode::InvalidProject,
            "Missing projectId",
            "projectId",
        ));
    }

    ctx.clients
        .delete_project(request.project_id, session.auth.account.account_id)
        .await?;

    Ok(empty())
}

/// Seed the submitted week with the project/task pairs logged the week
/// before. An empty prior week returns an empty body, not an error.
async fn copy_projects_from_last_week(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<StartAndEndDateRequest>,
) -> ApiResult<Json<DataBody<TimeRangeResponse>>> {
    if request.start_date.is_empty() || request.end_date.is_empty() {
        return Err(ApiError::new(
            ErrorCode::InvalidField,
            "Invalid start or end date",
        ));
    }

    let start = super::parse_date(&request.start_date, "startDate")?;
    let end = super::parse_date(&request.end_date, "endDate")?;

    let prior_week_start = start - Duration::days(7);
    let prior_week_end = prior_week_start + Duration::days(6);

    let entries = ctx
        .clients
        .copy_projects_from_ranges(
            session.auth.profile.profile_id,
            session.auth.account.account_id,
            prior_week_start,
            prior_week_end,
            start,
            end,
        )
        .await?;

    if entries.is_empty() {
        return Ok(Json(DataBody { data: None }));
    }

    Ok(data(TimeRangeResponse::new(&entries, start, end)))
}
