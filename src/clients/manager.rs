use crate::{
    db::time::{Client, Project, ProjectTask, ProjectTaskPair, TimeEntry},
    error::{ApiError, ApiResult, ErrorCode},
    timesheet::TimeManager,
};
use chrono::{Duration, NaiveDate};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Task attached to a project in a create/update request.
#[derive(Debug, Clone)]
pub struct ProjectTaskData {
    pub task_id: i64,
    pub rate: Option<f64>,
    pub billable: bool,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct ProjectData {
    pub client_id: i64,
    pub project_name: String,
    pub code: Option<String>,
    pub project_active: bool,
    pub tasks: Vec<ProjectTaskData>,
}

/// Clients, projects and their task associations, plus the copy-forward of
/// project/task pairs between timesheet weeks.
pub struct ClientManager {
    db: SqlitePool,
    time: Arc<TimeManager>,
}

impl ClientManager {
    pub fn new(db: SqlitePool, time: Arc<TimeManager>) -> Self {
        Self { db, time }
    }

    pub async fn client(&self, client_id: i64, account_id: i64) -> ApiResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT client_id, account_id, client_name, address, client_active \
             FROM client WHERE client_id = ?1 AND account_id = ?2",
        )
        .bind(client_id)
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(client)
    }

    pub async fn clients(&self, account_id: i64, active: bool) -> ApiResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT client_id, account_id, client_name, address, client_active \
             FROM client WHERE account_id = ?1 AND client_active = ?2 \
             ORDER BY LOWER(client_name)",
        )
        .bind(account_id)
        .bind(active)
        .fetch_all(&self.db)
        .await?;

        Ok(clients)
    }

    pub async fn create_client(
        &self,
        account_id: i64,
        name: &str,
        address: Option<&str>,
    ) -> ApiResult<Client> {
        let client_id: i64 = sqlx::query_scalar(
            "INSERT INTO client (account_id, client_name, address, client_active) \
             VALUES (?1, ?2, ?3, TRUE) RETURNING client_id",
        )
        .bind(account_id)
        .bind(name)
        .bind(address)
        .fetch_one(&self.db)
        .await?;

        Ok(Client {
            client_id,
            account_id,
            client_name: name.to_string(),
            address: address.map(str::to_string),
            client_active: true,
        })
    }

    pub async fn update_client(&self, client: &Client) -> ApiResult<()> {
        self.require_client(client.client_id, client.account_id).await?;

        let result = sqlx::query(
            "UPDATE client SET client_name = ?1, address = ?2, client_active = ?3 \
             WHERE client_id = ?4 AND account_id = ?5",
        )
        .bind(&client.client_name)
        .bind(&client.address)
        .bind(client.client_active)
        .bind(client.client_id)
        .bind(client.account_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidClient, "Client not found"));
        }

        Ok(())
    }

    pub async fn set_client_active(
        &self,
        client_id: i64,
        account_id: i64,
        active: bool,
    ) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE client SET client_active = ?3 WHERE client_id = ?1 AND account_id = ?2",
        )
        .bind(client_id)
        .bind(account_id)
        .bind(active)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidClient, "Client not found"));
        }

        Ok(())
    }

    pub async fn delete_client(&self, client_id: i64, account_id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM client WHERE client_id = ?1 AND account_id = ?2")
            .bind(client_id)
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidClient, "Client not found"));
        }

        Ok(())
    }

    /// Project with its active tasks; the owning client must be active.
    pub async fn project(&self, project_id: i64, account_id: i64) -> ApiResult<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT p.project_id, p.account_id, p.client_id, c.client_name, \
                    p.project_name, p.code, p.project_active \
             FROM project p \
             JOIN client c ON c.client_id = p.client_id \
             WHERE p.project_id = ?1 AND p.account_id = ?2 AND c.client_active = TRUE",
        )
        .bind(project_id)
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(mut project) = project else {
            return Ok(None);
        };

        project.tasks = sqlx::query_as::<_, ProjectTask>(
            "SELECT pt.project_id, pt.task_id, t.task_name, pt.rate, pt.billable, pt.active \
             FROM project_task pt \
             JOIN task t ON t.task_id = pt.task_id AND t.account_id = pt.account_id \
             WHERE pt.project_id = ?1 AND pt.account_id = ?2 AND t.task_active = TRUE \
             ORDER BY LOWER(t.task_name)",
        )
        .bind(project_id)
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(project))
    }

    pub async fn projects(&self, account_id: i64, active: bool) -> ApiResult<Vec<Project>> {
        let mut projects = sqlx::query_as::<_, Project>(
            "SELECT p.project_id, p.account_id, p.client_id, c.client_name, \
                    p.project_name, p.code, p.project_active \
             FROM project p \
             JOIN client c ON c.client_id = p.client_id AND c.account_id = p.account_id \
             WHERE p.account_id = ?1 AND c.client_active = TRUE AND p.project_active = ?2 \
             ORDER BY LOWER(c.client_name), LOWER(p.project_name)",
        )
        .bind(account_id)
        .bind(active)
        .fetch_all(&self.db)
        .await?;

        let all_tasks = sqlx::query_as::<_, ProjectTask>(
            "SELECT pt.project_id, pt.task_id, t.task_name, pt.rate, pt.billable, pt.active \
             FROM project_task pt \
             JOIN task t ON t.task_id = pt.task_id AND t.account_id = pt.account_id \
             WHERE pt.account_id = ?1 AND t.task_active = TRUE \
             ORDER BY LOWER(t.task_name)",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        for project in &mut projects {
            project.tasks = all_tasks
                .iter()
                .filter(|task| task.project_id == project.project_id)
                .cloned()
                .collect();
        }

        Ok(projects)
    }

    pub async fn create_project(&self, account_id: i64, data: &ProjectData) -> ApiResult<Project> {
        self.require_client(data.client_id, account_id).await?;

        let project_id: i64 = sqlx::query_scalar(
            "INSERT INTO project (account_id, client_id, project_name, code, project_active) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING project_id",
        )
        .bind(account_id)
        .bind(data.client_id)
        .bind(&data.project_name)
        .bind(&data.code)
        .bind(data.project_active)
        .fetch_one(&self.db)
        .await?;

        self.insert_project_tasks(project_id, account_id, &data.tasks)
            .await?;

        self.project(project_id, account_id)
            .await?
            .ok_or_else(|| ApiError::system("Created project not found"))
    }

    /// Update the project row and replace its task associations wholesale.
    pub async fn update_project(
        &self,
        project_id: i64,
        account_id: i64,
        data: &ProjectData,
    ) -> ApiResult<()> {
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM project WHERE project_id = ?1 AND account_id = ?2")
                .bind(project_id)
                .bind(account_id)
                .fetch_one(&self.db)
                .await?;

        if existing == 0 {
            return Err(ApiError::new(ErrorCode::InvalidProject, "No project found"));
        }

        sqlx::query(
            "UPDATE project SET project_name = ?1, client_id = ?2, code = ?3, project_active = ?4 \
             WHERE project_id = ?5 AND account_id = ?6",
        )
        .bind(&data.project_name)
        .bind(data.client_id)
        .bind(&data.code)
        .bind(data.project_active)
        .bind(project_id)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        sqlx::query("DELETE FROM project_task WHERE project_id = ?1 AND account_id = ?2")
            .bind(project_id)
            .bind(account_id)
            .execute(&self.db)
            .await?;

        self.insert_project_tasks(project_id, account_id, &data.tasks)
            .await?;

        Ok(())
    }

    async fn insert_project_tasks(
        &self,
        project_id: i64,
        account_id: i64,
        tasks: &[ProjectTaskData],
    ) -> ApiResult<()> {
        for task in tasks {
            sqlx::query(
                "INSERT INTO project_task (project_id, task_id, account_id, rate, billable, active) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(project_id)
            .bind(task.task_id)
            .bind(account_id)
            .bind(task.rate)
            .bind(task.billable)
            .bind(task.active)
            .execute(&self.db)
            .await?;
        }

        Ok(())
    }

    pub async fn set_project_active(
        &self,
        project_id: i64,
        account_id: i64,
        active: bool,
    ) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE project SET project_active = ?3 WHERE project_id = ?1 AND account_id = ?2",
        )
        .bind(project_id)
        .bind(account_id)
        .bind(active)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidProject, "Project not found"));
        }

        Ok(())
    }

    pub async fn delete_project(&self, project_id: i64, account_id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM project WHERE project_id = ?1 AND account_id = ?2")
            .bind(project_id)
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::InvalidProject, "Project not found"));
        }

        Ok(())
    }

    /// Carry the project/task pairs used in the "from" range into the "to"
    /// range as zero-hour rows, then return the refreshed "to" entries so the
    /// caller can render the week without a second round trip. No source
    /// entries is a no-op, not an error.
    pub async fn copy_projects_from_ranges(
        &self,
        profile_id: i64,
        account_id: i64,
        from_start: NaiveDate,
        from_end: NaiveDate,
        to_start: NaiveDate,
        to_end: NaiveDate,
    ) -> ApiResult<Vec<TimeEntry>> {
        let pairs = sqlx::query_as::<_, ProjectTaskPair>(
            "SELECT DISTINCT project_id, task_id FROM time_entry \
             WHERE profile_id = ?1 AND account_id = ?2 AND day >= ?3 AND day <= ?4",
        )
        .bind(profile_id)
        .bind(account_id)
        .bind(from_start)
        .bind(from_end)
        .fetch_all(&self.db)
        .await?;

        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.db.begin().await?;

        let mut day = to_start;
        while day <= to_end {
            for pair in &pairs {
                let result = sqlx::query(
                    "INSERT INTO time_entry (account_id, profile_id, project_id, task_id, day, hours) \
                     VALUES (?1, ?2, ?3, ?4, ?5, 0.0)",
                )
                .bind(account_id)
                .bind(profile_id)
                .bind(pair.project_id)
                .bind(pair.task_id)
                .bind(day)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(ApiError::system("No time entry rows inserted"));
                }
            }

            day += Duration::days(1);
        }

        tx.commit().await?;

        self.time
            .entries_for_range(profile_id, account_id, to_start, to_end)
            .await
    }

    async fn require_client(&self, client_id: i64, account_id: i64) -> ApiResult<()> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM client WHERE client_id = ?1 AND account_id = ?2")
                .bind(client_id)
                .bind(account_id)
                .fetch_one(&self.db)
                .await?;

        if count == 0 {
            return Err(ApiError::new(
                ErrorCode::InvalidClient,
                "Invalid client id for account",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::timesheet::TimeEntryInput;
    use chrono::Utc;

    async fn test_manager() -> ClientManager {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO account (company, account_status, created, updated) \
             VALUES ('Test Co', 'valid', ?1, ?1)",
        )
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO profile (email, password, first_name, created, updated) \
             VALUES ('ada@example.com', 'hash', 'Ada', ?1, ?1)",
        )
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        let time = Arc::new(TimeManager::new(pool.clone()));
        ClientManager::new(pool, time)
    }

    async fn seed_task(manager: &ClientManager, name: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO task (account_id, task_name) VALUES (1, ?1) RETURNING task_id")
            .bind(name)
            .fetch_one(&manager.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn client_crud_and_archive() {
        let manager = test_manager().await;

        let client = manager
            .create_client(1, "Acme", Some("1 Main St"))
            .await
            .unwrap();
        assert!(client.client_active);

        // Tenant isolation: another account cannot see it
        assert!(manager.client(client.client_id, 2).await.unwrap().is_none());

        manager.set_client_active(client.client_id, 1, false).await.unwrap();
        assert!(manager.clients(1, true).await.unwrap().is_empty());
        assert_eq!(manager.clients(1, false).await.unwrap().len(), 1);

        manager.set_client_active(client.client_id, 1, true).await.unwrap();
        assert_eq!(manager.clients(1, true).await.unwrap().len(), 1);

        manager.delete_client(client.client_id, 1).await.unwrap();
        let err = manager.delete_client(client.client_id, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn project_with_tasks_round_trip() {
        let manager = test_manager().await;

        let client = manager.create_client(1, "Acme", None).await.unwrap();
        let task_id = seed_task(&manager, "Development").await;

        let project = manager
            .create_project(
                1,
                &ProjectData {
                    client_id: client.client_id,
                    project_name: "Website".to_string(),
                    code: Some("WEB".to_string()),
                    project_active: true,
                    tasks: vec![ProjectTaskData {
                        task_id,
                        rate: Some(125.0),
                        billable: true,
                        active: true,
                    }],
                },
            )
            .await
            .unwrap();

        assert_eq!(project.client_name, "Acme");
        assert_eq!(project.tasks.len(), 1);
        assert_eq!(project.tasks[0].rate, Some(125.0));

        // Replacing the task set on update
        let other_task = seed_task(&manager, "Design").await;
        manager
            .update_project(
                project.project_id,
                1,
                &ProjectData {
                    client_id: client.client_id,
                    project_name: "Website v2".to_string(),
                    code: None,
                    project_active: true,
                    tasks: vec![ProjectTaskData {
                        task_id: other_task,
                        rate: None,
                        billable: false,
                        active: true,
                    }],
                },
            )
            .await
            .unwrap();

        let updated = manager.project(project.project_id, 1).await.unwrap().unwrap();
        assert_eq!(updated.project_name, "Website v2");
        assert_eq!(updated.tasks.len(), 1);
        assert_eq!(updated.tasks[0].task_id, other_task);
    }

    #[tokio::test]
    async fn create_project_requires_owned_client() {
        let manager = test_manager().await;

        let err = manager
            .create_project(
                1,
                &ProjectData {
                    client_id: 42,
                    project_name: "Orphan".to_string(),
                    code: None,
                    project_active: true,
                    tasks: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn copy_with_no_source_entries_is_a_no_op() {
        let manager = test_manager().await;

        let from_start = NaiveDate::from_ymd_opt(2019, 1, 7).unwrap();
        let from_end = NaiveDate::from_ymd_opt(2019, 1, 13).unwrap();
        let to_start = NaiveDate::from_ymd_opt(2019, 1, 14).unwrap();
        let to_end = NaiveDate::from_ymd_opt(2019, 1, 20).unwrap();

        let copied = manager
            .copy_projects_from_ranges(1, 1, from_start, from_end, to_start, to_end)
            .await
            .unwrap();
        assert!(copied.is_empty());
    }

    #[tokio::test]
    async fn copy_fills_target_range_with_zero_hours() {
        let manager = test_manager().await;

        let client = manager.create_client(1, "Acme", None).await.unwrap();
        let task_id = seed_task(&manager, "Development").await;
        let project = manager
            .create_project(
                1,
                &ProjectData {
                    client_id: client.client_id,
                    project_name: "Website".to_string(),
                    code: None,
                    project_active: true,
                    tasks: vec![ProjectTaskData {
                        task_id,
                        rate: Some(100.0),
                        billable: true,
                        active: true,
                    }],
                },
            )
            .await
            .unwrap();

        manager
            .time
            .save_or_update_entries(&[TimeEntryInput {
                account_id: 1,
                profile_id: 1,
                project_id: project.project_id,
                task_id,
                day: NaiveDate::from_ymd_opt(2019, 1, 9).unwrap(),
                hours: 5.0,
            }])
            .await
            .unwrap();

        let to_start = NaiveDate::from_ymd_opt(2019, 1, 14).unwrap();
        let to_end = NaiveDate::from_ymd_opt(2019, 1, 20).unwrap();
        let copied = manager
            .copy_projects_from_ranges(
                1,
                1,
                NaiveDate::from_ymd_opt(2019, 1, 7).unwrap(),
                NaiveDate::from_ymd_opt(2019, 1, 13).unwrap(),
                to_start,
                to_end,
            )
            .await
            .unwrap();

        assert_eq!(copied.len(), 7);
        assert!(copied.iter().all(|entry| entry.hours == 0.0));
        assert!(copied
            .iter()
            .all(|entry| entry.project_id == project.project_id && entry.task_id == task_id));
    }
}
