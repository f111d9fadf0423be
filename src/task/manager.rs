use crate::{
    db::time::Task,
    error::{ApiError, ApiResult, ErrorCode},
};
use sqlx::SqlitePool;

/// Work categories reusable across projects via project_task associations.
pub struct TaskManager {
    db: SqlitePool,
}

impl TaskManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn task(&self, task_id: i64, account_id: i64) -> ApiResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT task_id, account_id, task_name, default_rate, default_billable, common, task_active \
             FROM task WHERE task_id = ?1 AND account_id = ?2",
        )
        .bind(task_id)
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(task)
    }

    pub async fn tasks(&self, account_id: i64, active: bool) -> ApiResult<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT task_id, account_id, task_name, default_rate, default_billable, common, task_active \
             FROM task WHERE account_id = ?1 AND task_active = ?2 \
             ORDER BY LOWER(task_name)",
        )
        .bind(account_id)
        .bind(active)
        .fetch_all(&self.db)
        .await?;

        Ok(tasks)
    }

    pub async fn save_task(
        &self,
        account_id: i64,
        name: &str,
        common: bool,
        rate: Option<f64>,
        billable: bool,
    ) -> ApiResult<Task> {
        let task_id: i64 = sqlx::query_scalar(
            "INSERT INTO task (account_id, task_name, default_rate, default_billable, common, task_active) \
             VALUES (?1, ?2, ?3, ?4, ?5, TRUE) RETURNING task_id",
        )
        .bind(account_id)
        .bind(name)
        .bind(rate)
        .bind(billable)
        .bind(common)
        .fetch_one(&self.db)
        .await?;

        Ok(Task {
            task_id,
            account_id,
            task_name: name.to_string(),
            default_rate: rate,
            default_billable: billable,
            common,
            task_active: true,
        })
    }

    pub async fn update_task(&self, task: &Task) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE task SET task_name = ?1, default_rate = ?2, default_billable = ?3, common = ?4 \
             WHERE task_id = ?5 AND account_id = ?6",
        )
        .bind(&task.task_name)
        .bind(task.default_rate)
        .bind(task.default_billable)
        .bind(task.common)
        .bind(task.task_id)
        .bind(task.account_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidTask, "Task not found"));
        }

        Ok(())
    }

    pub async fn set_task_active(
        &self,
        task_id: i64,
        account_id: i64,
        active: bool,
    ) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE task SET task_active = ?3 WHERE task_id = ?1 AND account_id = ?2",
        )
        .bind(task_id)
        .bind(account_id)
        .bind(active)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidTask, "Task not found"));
        }

        Ok(())
    }

    pub async fn delete_task(&self, task_id: i64, account_id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM task WHERE task_id = ?1 AND account_id = ?2")
            .bind(task_id)
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidTask, "Task not found"));
        }

        Ok(())
    }
}
