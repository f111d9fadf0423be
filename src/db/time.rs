/// Row models for billing entities, time entries and report aggregates
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Client {
    pub client_id: i64,
    pub account_id: i64,
    pub client_name: String,
    pub address: Option<String>,
    pub client_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Project {
    pub project_id: i64,
    pub account_id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub project_name: String,
    pub code: Option<String>,
    pub project_active: bool,
    #[sqlx(skip)]
    pub tasks: Vec<ProjectTask>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub task_id: i64,
    pub account_id: i64,
    pub task_name: String,
    pub default_rate: Option<f64>,
    pub default_billable: bool,
    pub common: bool,
    pub task_active: bool,
}

/// Task attached to a project, carrying the project-specific billing terms
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectTask {
    pub project_id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub rate: Option<f64>,
    pub billable: bool,
    pub active: bool,
}

/// The fact table row, joined to display names when read back
#[derive(Debug, Clone)]
pub struct TimeEntry {
    pub account_id: i64,
    pub profile_id: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub day: NaiveDate,
    pub hours: f64,
    pub client_name: String,
    pub project_name: String,
    pub task_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ProjectTaskPair {
    pub project_id: i64,
    pub task_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ClientReportRow {
    pub client_id: i64,
    pub client_name: String,
    pub non_billable_hours: Option<f64>,
    pub billable_hours: Option<f64>,
    pub billable_total: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ProjectReportRow {
    pub project_id: i64,
    pub project_name: String,
    pub client_name: String,
    pub non_billable_hours: Option<f64>,
    pub billable_hours: Option<f64>,
    pub billable_total: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TaskReportRow {
    pub task_id: i64,
    pub task_name: String,
    pub non_billable_hours: Option<f64>,
    pub billable_hours: Option<f64>,
    pub billable_total: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PersonReportRow {
    pub profile_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub non_billable_hours: Option<f64>,
    pub billable_hours: Option<f64>,
    pub billable_total: Option<f64>,
}
