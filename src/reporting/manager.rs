use crate::{
    db::time::{ClientReportRow, PersonReportRow, ProjectReportRow, TaskReportRow},
    error::ApiResult,
};
use chrono::NaiveDate;
use sqlx::SqlitePool;

pub const REPORT_PAGINATION_LIMIT: i64 = 100;

/// Grouped billable/non-billable sums over positive-hour entries within a
/// date range, paginated a fixed page at a time.
pub struct ReportManager {
    db: SqlitePool,
}

impl ReportManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn time_by_client(
        &self,
        account_id: i64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        page: i64,
    ) -> ApiResult<Vec<ClientReportRow>> {
        let rows = sqlx::query_as::<_, ClientReportRow>(
            "SELECT c.client_id, \
                    c.client_name, \
                    sum(t.hours) FILTER (WHERE NOT pt.billable)       AS non_billable_hours, \
                    sum(t.hours) FILTER (WHERE pt.billable)           AS billable_hours, \
                    sum(t.hours * pt.rate) FILTER (WHERE pt.billable) AS billable_total \
             FROM time_entry t \
             JOIN project_task pt \
               ON pt.account_id = t.account_id \
              AND pt.project_id = t.project_id \
              AND pt.task_id = t.task_id \
             JOIN project p ON p.project_id = pt.project_id \
             JOIN client c ON c.client_id = p.client_id \
             WHERE t.account_id = ?1 \
               AND t.hours > 0.0 \
               AND t.day >= ?2 \
               AND t.day <= ?3 \
             GROUP BY c.client_id \
             ORDER BY c.client_name COLLATE NOCASE \
             LIMIT ?4 OFFSET ?5",
        )
        .bind(account_id)
        .bind(from_date)
        .bind(to_date)
        .bind(REPORT_PAGINATION_LIMIT)
        .bind(page * REPORT_PAGINATION_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn time_by_project(
        &self,
        account_id: i64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        page: i64,
    ) -> ApiResult<Vec<ProjectReportRow>> {
        let rows = sqlx::query_as::<_, ProjectReportRow>(
            "SELECT p.project_id, \
                    p.project_name, \
                    c.client_name, \
                    bt.non_billable_hours, \
                    bt.billable_hours, \
                    bt.billable_total \
             FROM (SELECT t.project_id, \
                          sum(t.hours) FILTER (WHERE NOT pt.billable)       AS non_billable_hours, \
                          sum(t.hours) FILTER (WHERE pt.billable)           AS billable_hours, \
                          sum(t.hours * pt.rate) FILTER (WHERE pt.billable) AS billable_total \
                   FROM time_entry t \
                   JOIN project_task pt \
                     ON pt.account_id = t.account_id \
                    AND pt.project_id = t.project_id \
                    AND pt.task_id = t.task_id \
                   WHERE t.account_id = ?1 \
                     AND t.hours > 0.0 \
                     AND t.day >= ?2 \
                     AND t.day <= ?3 \
                   GROUP BY t.project_id \
                   ORDER BY t.project_id \
                   LIMIT ?4 OFFSET ?5) bt \
             JOIN project p ON p.project_id = bt.project_id \
             JOIN client c ON c.client_id = p.client_id \
             ORDER BY p.project_name COLLATE NOCASE",
        )
        .bind(account_id)
        .bind(from_date)
        .bind(to_date)
        .bind(REPORT_PAGINATION_LIMIT)
        .bind(page * REPORT_PAGINATION_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn time_by_task(
        &self,
        account_id: i64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        page: i64,
    ) -> ApiResult<Vec<TaskReportRow>> {
        let rows = sqlx::query_as::<_, TaskReportRow>(
            "SELECT k.task_id, \
                    k.task_name, \
                    bt.non_billable_hours, \
                    bt.billable_hours, \
                    bt.billable_total \
             FROM (SELECT t.task_id, \
                          sum(t.hours) FILTER (WHERE NOT pt.billable)       AS non_billable_hours, \
                          sum(t.hours) FILTER (WHERE pt.billable)           AS billable_hours, \
                          sum(t.hours * pt.rate) FILTER (WHERE pt.billable) AS billable_total \
                   FROM time_entry t \
                   JOIN project_task pt \
                     ON pt.account_id = t.account_id \
                    AND pt.project_id = t.project_id \
                    AND pt.task_id = t.task_id \
                   WHERE t.account_id = ?1 \
                     AND t.hours > 0.0 \
                     AND t.day >= ?2 \
                     AND t.day <= ?3 \
                   GROUP BY t.task_id \
                   ORDER BY t.task_id \
                   LIMIT ?4 OFFSET ?5) bt \
             JOIN task k ON k.task_id = bt.task_id \
             ORDER BY k.task_name COLLATE NOCASE",
        )
        .bind(account_id)
        .bind(from_date)
        .bind(to_date)
        .bind(REPORT_PAGINATION_LIMIT)
        .bind(page * REPORT_PAGINATION_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn time_by_person(
        &self,
        account_id: i64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        page: i64,
    ) -> ApiResult<Vec<PersonReportRow>> {
        let rows = sqlx::query_as::<_, PersonReportRow>(
            "SELECT p.profile_id, \
                    p.first_name, \
                    p.last_name, \
                    sum(t.hours) FILTER (WHERE NOT pt.billable)       AS non_billable_hours, \
                    sum(t.hours) FILTER (WHERE pt.billable)           AS billable_hours, \
                    sum(t.hours * pt.rate) FILTER (WHERE pt.billable) AS billable_total \
             FROM time_entry t \
             JOIN project_task pt \
               ON pt.account_id = t.account_id \
              AND pt.project_id = t.project_id \
              AND pt.task_id = t.task_id \
             JOIN profile p ON p.profile_id = t.profile_id \
             WHERE t.account_id = ?1 \
               AND t.hours > 0.0 \
               AND t.day >= ?2 \
               AND t.day <= ?3 \
             GROUP BY p.profile_id \
             ORDER BY p.last_name COLLATE NOCASE \
             LIMIT ?4 OFFSET ?5",
        )
        .bind(account_id)
        .bind(from_date)
        .bind(to_date)
        .bind(REPORT_PAGINATION_LIMIT)
        .bind(page * REPORT_PAGINATION_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
