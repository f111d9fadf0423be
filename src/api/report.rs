/// Aggregate reporting endpoints with CSV export variants
use crate::{
    api::{data, parse_date, DataBody},
    auth::AuthSession,
    context::AppContext,
    db::time::{ClientReportRow, PersonReportRow, ProjectReportRow, TaskReportRow},
    error::{ApiError, ApiResult, ErrorCode},
    reporting::{adjust_for_week_start, export},
};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReportQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReportResponse {
    pub client_id: i64,
    pub client_name: String,
    pub non_billable_hours: f64,
    pub billable_hours: f64,
    pub billable_total: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReportResponse {
    pub project_id: i64,
    pub project_name: String,
    pub client_name: String,
    pub non_billable_hours: f64,
    pub billable_hours: f64,
    pub billable_total: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReportResponse {
    pub task_id: i64,
    pub task_name: String,
    pub non_billable_hours: f64,
    pub billable_hours: f64,
    pub billable_total: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonReportResponse {
    pub profile_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub non_billable_hours: f64,
    pub billable_hours: f64,
    pub billable_total: f64,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/time/client", get(time_by_client))
        .route("/time/project", get(time_by_project))
        .route("/time/task", get(time_by_task))
        .route("/time/person", get(time_by_person))
        .route("/time/export/client", get(export_time_by_client))
        .route("/time/export/project", get(export_time_by_project))
        .route("/time/export/task", get(export_time_by_task))
        .route("/time/export/person", get(export_time_by_person))
}

/// Resolve from/to/page. `from` is required; `to` defaults to today.
fn report_window(query: &ReportQuery) -> ApiResult<(NaiveDate, NaiveDate, i64)> {
    let Some(from) = query.from.as_deref().filter(|from| !from.is_empty()) else {
        return Err(ApiError::field(
            ErrorCode::InvalidField,
            "No from parameter",
            "from",
        ));
    };
    let from_date = parse_date(from, "from")?;

    let to_date = match query.to.as_deref().filter(|to| !to.is_empty()) {
        Some(to) => parse_date(to, "to")?,
        None => Utc::now().date_naive(),
    };

    let page = match query.page.as_deref().filter(|page| !page.is_empty()) {
        Some(page) => page.parse::<i64>().map_err(|e| {
            ApiError::field(ErrorCode::InvalidField, "Invalid page offset", "page").with_source(e)
        })?,
        None => 0,
    };

    Ok((from_date, to_date, page))
}

async fn time_by_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<DataBody<Vec<ClientReportResponse>>>> {
    let (from_date, to_date, page) = report_window(&query)?;

    let (from_date, to_date) = adjust_for_week_start(
        from_date,
        to_date,
        session.auth.account.week_start,
        Utc::now().date_naive(),
    );

    let rows = ctx
        .reports
        .time_by_client(session.auth.account.account_id, from_date, to_date, page)
        .await?;

    Ok(data(rows.iter().map(client_response).collect()))
}

async fn time_by_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<DataBody<Vec<ProjectReportResponse>>>> {
    let (from_date, to_date, page) = report_window(&query)?;

    let rows = ctx
        .reports
        .time_by_project(session.auth.account.account_id, from_date, to_date, page)
        .await?;

    Ok(data(rows.iter().map(project_response).collect()))
}

async fn time_by_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<DataBody<Vec<TaskReportResponse>>>> {
    let (from_date, to_date, page) = report_window(&query)?;

    let rows = ctx
        .reports
        .time_by_task(session.auth.account.account_id, from_date, to_date, page)
        .await?;

    Ok(data(rows.iter().map(task_response).collect()))
}

async fn time_by_person(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<DataBody<Vec<PersonReportResponse>>>> {
    let (from_date, to_date, page) = report_window(&query)?;

    let rows = ctx
        .reports
        .time_by_person(session.auth.account.account_id, from_date, to_date, page)
        .await?;

    Ok(data(rows.iter().map(person_response).collect()))
}

fn csv_response(
    company: &str,
    from_date: NaiveDate,
    to_date: NaiveDate,
    body: Vec<u8>,
) -> Response {
    let filename = export::export_filename(company, from_date, to_date);

    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment;filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_time_by_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let (from_date, to_date, _) = report_window(&query)?;

    let rows = ctx
        .reports
        .time_by_client(session.auth.account.account_id, from_date, to_date, 0)
        .await?;

    let body = export::client_report_csv(&rows)?;
    Ok(csv_response(&session.auth.account.company, from_date, to_date, body))
}

async fn export_time_by_project(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let (from_date, to_date, _) = report_window(&query)?;

    let rows = ctx
        .reports
        .time_by_project(session.auth.account.account_id, from_date, to_date, 0)
        .await?;

    let body = export::project_report_csv(&rows)?;
    Ok(csv_response(&session.auth.account.company, from_date, to_date, body))
}

async fn export_time_by_task(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let (from_date, to_date, _) = report_window(&query)?;

    let rows = ctx
        .reports
        .time_by_task(session.auth.account.account_id, from_date, to_date, 0)
        .await?;

    let body = export::task_report_csv(&rows)?;
    Ok(csv_response(&session.auth.account.company, from_date, to_date, body))
}

async fn export_time_by_person(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let (from_date, to_date, _) = report_window(&query)?;

    let rows = ctx
        .reports
        .time_by_person(session.auth.account.account_id, from_date, to_date, 0)
        .await?;

    let body = export::person_report_csv(&rows)?;
    Ok(csv_response(&session.auth.account.company, from_date, to_date, body))
}

fn client_response(row: &ClientReportRow) -> ClientReportResponse {
    ClientReportResponse {
        client_id: row.client_id,
        client_name: row.client_name.clone(),
        non_billable_hours: row.non_billable_hours.unwrap_or(0.0),
        billable_hours: row.billable_hours.unwrap_or(0.0),
        billable_total: row.billable_total.unwrap_or(0.0),
    }
}

fn project_response(row: &ProjectReportRow) -> ProjectReportResponse {
    ProjectReportResponse {
        project_id: row.project_id,
        project_name: row.project_name.clone(),
        client_name: row.client_name.clone(),
        non_billable_hours: row.non_billable_hours.unwrap_or(0.0),
        billable_hours: row.billable_hours.unwrap_or(0.0),
        billable_total: row.billable_total.unwrap_or(0.0),
    }
}

fn task_response(row: &TaskReportRow) -> TaskReportResponse {
    TaskReportResponse {
        task_id: row.task_id,
        task_name: row.task_name.clone(),
        non_billable_hours: row.non_billable_hours.unwrap_or(0.0),
        billable_hours: row.billable_hours.unwrap_or(0.0),
        billable_total: row.billable_total.unwrap_or(0.0),
    }
}

fn person_response(row: &PersonReportRow) -> PersonReportResponse {
    PersonReportResponse {
        profile_id: row.profile_id,
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        non_billable_hours: row.non_billable_hours.unwrap_or(0.0),
        billable_hours: row.billable_hours.unwrap_or(0.0),
        billable_total: row.billable_total.unwrap_or(0.0),
    }
}
