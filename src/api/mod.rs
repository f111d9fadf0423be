/// API routes, handlers and wire DTOs
pub mod account;
pub mod auth;
pub mod client;
pub mod profile;
pub mod project;
pub mod report;
pub mod task;
pub mod time;

use crate::{
    config::ISO_SHORT_DATE_FORMAT,
    context::AppContext,
    error::{ApiError, ApiResult, ErrorCode},
};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use serde::Serialize;

/// Request body extractor that renders malformed JSON into the error envelope
pub type ApiJson<T> = WithRejection<Json<T>, ApiError>;

/// Success envelope: `{"data": ...}`, or `{}` for empty responses
#[derive(Serialize)]
pub struct DataBody<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn data<T: Serialize>(value: T) -> Json<DataBody<T>> {
    Json(DataBody { data: Some(value) })
}

pub fn empty() -> Json<DataBody<()>> {
    Json(DataBody { data: None })
}

/// Day-level wire dates are ISO-8601 short form.
pub fn parse_date(value: &str, field: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value, ISO_SHORT_DATE_FORMAT).map_err(|e| {
        ApiError::field(
            ErrorCode::InvalidField,
            "Invalid format. Use ISO8601: YYYY-MM-DD",
            field,
        )
        .with_source(e)
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(ISO_SHORT_DATE_FORMAT).to_string()
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/account", account::routes())
        .nest("/api/profile", profile::routes())
        .nest("/api/client", client::routes())
        .nest("/api/task", task::routes())
        .nest("/api/time", time::routes())
        .nest("/api/report", report::routes())
}
