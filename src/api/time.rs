/// Weekly timesheet endpoints
use crate::{
    api::{data, empty, format_date, parse_date, ApiJson, DataBody},
    auth::AuthSession,
    context::AppContext,
    db::time::TimeEntry,
    error::{ApiError, ApiResult, ErrorCode},
    timesheet::{week, TimeEntryInput},
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeEntryRequest {
    pub day: String,
    pub hours: f64,
    pub project_id: i64,
    pub task_id: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeEntryRangeRequest {
    pub entries: Option<Vec<TimeEntryRequest>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectWeekRequest {
    pub start_date: String,
    pub end_date: String,
    pub project_id: i64,
    pub task_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryResponse {
    pub day: String,
    pub hours: f64,
    pub project_id: i64,
    pub task_id: i64,
    pub client_name: String,
    pub project_name: String,
    pub task_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeResponse {
    pub start: String,
    pub end: String,
    pub entries: Vec<TimeEntryResponse>,
}

impl TimeRangeResponse {
    pub fn new(entries: &[TimeEntry], start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: format_date(start),
            end: format_date(end),
            entries: entries
                .iter()
                .map(|entry| TimeEntryResponse {
                    day: format_date(entry.day),
                    hours: entry.hours,
                    project_id: entry.project_id,
                    task_id: entry.task_id,
                    client_name: entry.client_name.clone(),
                    project_name: entry.project_name.clone(),
                    task_name: entry.task_name.clone(),
                })
                .collect(),
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(save_time_entries).put(update_time_entries))
        .route("/week", get(get_time_entries_for_week))
        .route("/week/:startDate", get(get_time_entries_for_week_from))
        .route("/project/week", post(add_project_to_week).delete(delete_project_for_week))
}

async fn get_time_entries_for_week(
    State(ctx): State<AppContext>,
    session: AuthSession,
) -> ApiResult<Json<DataBody<TimeRangeResponse>>> {
    entries_for_week(&ctx, &session, None).await
}

async fn get_time_entries_for_week_from(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Path(start_date): Path<String>,
) -> ApiResult<Json<DataBody<TimeRangeResponse>>> {
    entries_for_week(&ctx, &session, Some(start_date)).await
}

/// Week resolved from the account's configured start weekday: from the given
/// reference date, or from today in the profile's timezone.
async fn entries_for_week(
    ctx: &AppContext,
    session: &AuthSession,
    start_date: Option<String>,
) -> ApiResult<Json<DataBody<TimeRangeResponse>>> {
    let weekday = week::weekday_from_index(session.auth.account.week_start);

    let (start, end) = match start_date {
        Some(start_date) if !start_date.is_empty() => {
            let reference = parse_date(&start_date, "startDate")?;
            week::week_range_from_date(reference, weekday)
        }
        _ => week::current_week_range(&session.auth.profile.timezone, weekday),
    };

    let entries = ctx
        .time
        .entries_for_range(
            session.auth.profile.profile_id,
            session.auth.account.account_id,
            start,
            end,
        )
        .await?;

    Ok(data(TimeRangeResponse::new(&entries, start, end)))
}

fn build_entries(
    session: &AuthSession,
    request: TimeEntryRangeRequest,
) -> ApiResult<Vec<TimeEntryInput>> {
    let Some(entries) = request.entries else {
        return Err(ApiError::new(
            ErrorCode::InvalidJson,
            "Invalid JSON. No time entries array.",
        ));
    };

    let mut inputs = Vec::with_capacity(entries.len());
    for entry in entries {
        let day = parse_date(&entry.day, "day")?;

        if entry.project_id <= 0 || entry.task_id <= 0 {
            return Err(ApiError::new(
                ErrorCode::InvalidField,
                "Missing or invalid project id or task id",
            ));
        }

        inputs.push(TimeEntryInput {
            account_id: session.auth.account.account_id,
            profile_id: session.auth.profile.profile_id,
            project_id: entry.project_id,
            task_id: entry.task_id,
            day,
            hours: entry.hours,
        });
    }

    Ok(inputs)
}

async fn save_time_entries(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<TimeEntryRangeRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    let entries = build_entries(&session, request)?;
    ctx.time.save_or_update_entries(&entries).await?;

    Ok(empty())
}

async fn update_time_entries(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<TimeEntryRangeRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    let entries = build_entries(&session, request)?;
    ctx.time.update_entries(&entries).await?;

    Ok(empty())
}

async fn add_project_to_week(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProjectWeekRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.start_date.is_empty() || request.end_date.is_empty() {
        return Err(ApiError::new(
            ErrorCode::InvalidField,
            "Invalid start or end date",
        ));
    }

    if request.project_id <= 0 {
        return Err(ApiError::new(ErrorCode::InvalidProject, "Missing projectId"));
    }

    if request.task_id <= 0 {
        return Err(ApiError::new(ErrorCode::InvalidTask, "Missing taskId"));
    }

    let start = parse_date(&request.start_date, "startDate")?;
    let end = parse_date(&request.end_date, "endDate")?;

    ctx.time
        .add_initial_entries(
            session.auth.profile.profile_id,
            session.auth.account.account_id,
            start,
            end,
            request.project_id,
            request.task_id,
        )
        .await?;

    Ok(empty())
}

async fn delete_project_for_week(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProjectWeekRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.project_id <= 0 {
        return Err(ApiError::field(
            ErrorCode::InvalidField,
            "Invalid or missing projectId",
            "projectId",
        ));
    }

    if request.task_id <= 0 {
        return Err(ApiError::field(
            ErrorCode::InvalidField,
            "Invalid or missing taskId",
            "taskId",
        ));
    }

    if request.start_date.is_empty() {
        return Err(ApiError::field(
            ErrorCode::InvalidField,
            "Missing startDate",
            "startDate",
        ));
    }

    if request.end_date.is_empty() {
        return Err(ApiError::field(
            ErrorCode::InvalidField,
            "Missing endDate",
            "endDate",
        ));
    }

    let start = parse_date(&request.start_date, "startDate")?;
    let end = parse_date(&request.end_date, "endDate")?;

    if end > start + Duration::days(7) {
        return Err(ApiError::new(
            ErrorCode::InvalidField,
            "Can only delete 1 week of data",
        ));
    }

    ctx.time
        .delete_project_for_dates(
            session.auth.profile.profile_id,
            session.auth.account.account_id,
            request.project_id,
            request.task_id,
            start,
            end,
        )
        .await?;

    Ok(empty())
}
