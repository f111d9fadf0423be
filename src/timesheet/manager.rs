use crate::{
    db::time::TimeEntry,
    error::{ApiError, ApiResult, ErrorCode},
};
use chrono::{Duration, NaiveDate};
use sqlx::{Row, SqlitePool};

/// Hours above this are capped on the update path
const MAX_HOURS: f64 = 9999.0;

/// An entry as submitted by a caller, before clamping.
#[derive(Debug, Clone)]
pub struct TimeEntryInput {
    pub account_id: i64,
    pub profile_id: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub day: NaiveDate,
    pub hours: f64,
}

/// Batch reconciliation of the time fact table. Every multi-row operation is
/// all-or-nothing inside one transaction.
pub struct TimeManager {
    db: SqlitePool,
}

impl TimeManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Entries in [start, end] joined to their display names, ordered by day.
    pub async fn entries_for_range(
        &self,
        profile_id: i64,
        account_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<TimeEntry>> {
        let rows = sqlx::query(
            "SELECT t.account_id, t.profile_id, t.project_id, t.task_id, t.day, t.hours, \
                    c.client_name, p.project_name, k.task_name \
             FROM time_entry t \
             JOIN project p ON p.project_id = t.project_id \
             JOIN client c ON c.client_id = p.client_id \
             JOIN task k ON k.task_id = t.task_id \
             WHERE t.account_id = ?1 AND t.profile_id = ?2 AND t.day >= ?3 AND t.day <= ?4 \
             ORDER BY t.day",
        )
        .bind(account_id)
        .bind(profile_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        let entries = rows
            .iter()
            .map(|row| TimeEntry {
                account_id: row.get("account_id"),
                profile_id: row.get("profile_id"),
                project_id: row.get("project_id"),
                task_id: row.get("task_id"),
                day: row.get("day"),
                hours: row.get("hours"),
                client_name: row.get("client_name"),
                project_name: row.get("project_name"),
                task_name: row.get("task_name"),
            })
            .collect();

        Ok(entries)
    }

    /// Upsert keyed by (account, profile, project, task, day): insert, and on
    /// conflict overwrite the hours. Negative hours clamp to zero.
    pub async fn save_or_update_entries(&self, entries: &[TimeEntryInput]) -> ApiResult<()> {
        if entries.is_empty() {
            tracing::warn!("no time entries to save or update");
            return Ok(());
        }

        let mut tx = self.db.begin().await?;

        for entry in entries {
            let hours = entry.hours.max(0.0);

            let result = sqlx::query(
                "INSERT INTO time_entry (account_id, profile_id, project_id, task_id, day, hours) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT (account_id, profile_id, project_id, task_id, day) \
                 DO UPDATE SET hours = excluded.hours",
            )
            .bind(entry.account_id)
            .bind(entry.profile_id)
            .bind(entry.project_id)
            .bind(entry.task_id)
            .bind(entry.day)
            .bind(hours)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ApiError::system("No time entry rows affected"));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Update each row, falling back to an insert when nothing matched.
    /// Functionally the same end state as the upsert, exercised through a
    /// different path. Hours clamp to [0, 9999].
    pub async fn update_entries(&self, entries: &[TimeEntryInput]) -> ApiResult<()> {
        if entries.is_empty() {
            tracing::warn!("no time entries to update");
            return Ok(());
        }

        let mut tx = self.db.begin().await?;

        for entry in entries {
            let mut hours = entry.hours.max(0.0);
            if hours > MAX_HOURS {
                tracing::warn!(hours, "time entry hours too big, capping at {MAX_HOURS}");
                hours = MAX_HOURS;
            }

            let result = sqlx::query(
                "UPDATE time_entry SET hours = ?6 \
                 WHERE account_id = ?1 AND profile_id = ?2 AND project_id = ?3 \
                   AND task_id = ?4 AND day = ?5",
            )
            .bind(entry.account_id)
            .bind(entry.profile_id)
            .bind(entry.project_id)
            .bind(entry.task_id)
            .bind(entry.day)
            .bind(hours)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::warn!("update matched no time entry, inserting");

                let result = sqlx::query(
                    "INSERT INTO time_entry (account_id, profile_id, project_id, task_id, day, hours) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .bind(entry.account_id)
                .bind(entry.profile_id)
                .bind(entry.project_id)
                .bind(entry.task_id)
                .bind(entry.day)
                .bind(hours)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(ApiError::system("No time entry rows affected"));
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Seed a zero-hours row for every day of [start, end] inclusive.
    pub async fn add_initial_entries(
        &self,
        profile_id: i64,
        account_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        project_id: i64,
        task_id: i64,
    ) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;

        let mut day = start;
        while day <= end {
            let result = sqlx::query(
                "INSERT INTO time_entry (account_id, profile_id, project_id, task_id, day, hours) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 0.0)",
            )
            .bind(account_id)
            .bind(profile_id)
            .bind(project_id)
            .bind(task_id)
            .bind(day)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ApiError::system("No time entry rows inserted"));
            }

            day += Duration::days(1);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete the project/task entries within [start, end]. Nothing matching
    /// is a client error, not a no-op.
    pub async fn delete_project_for_dates(
        &self,
        profile_id: i64,
        account_id: i64,
        project_id: i64,
        task_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<()> {
        let result = sqlx::query(
            "DELETE FROM time_entry \
             WHERE profile_id = ?1 AND account_id = ?2 AND project_id = ?3 AND task_id = ?4 \
               AND day >= ?5 AND day <= ?6",
        )
        .bind(profile_id)
        .bind(account_id)
        .bind(project_id)
        .bind(task_id)
        .bind(start)
        .bind(end)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(
                ErrorCode::InvalidField,
                "No matching project/task time entries found",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Utc;

    async fn test_manager() -> TimeManager {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        seed_billing(&pool).await;
        TimeManager::new(pool)
    }

    /// Account 1 with client 1, project 1 and task 1 wired together.
    async fn seed_billing(pool: &SqlitePool) {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO account (company, account_status, created, updated) \
             VALUES ('Test Co', 'valid', ?1, ?1)",
        )
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO profile (email, password, first_name, created, updated) \
             VALUES ('ada@example.com', 'hash', 'Ada', ?1, ?1)",
        )
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO client (account_id, client_name) VALUES (1, 'Acme')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO project (account_id, client_id, project_name) VALUES (1, 1, 'Website')",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO task (account_id, task_name) VALUES (1, 'Development')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO project_task (project_id, task_id, account_id, rate, billable) \
             VALUES (1, 1, 1, 100.0, TRUE)",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    fn entry(day: &str, hours: f64) -> TimeEntryInput {
        TimeEntryInput {
            account_id: 1,
            profile_id: 1,
            project_id: 1,
            task_id: 1,
            day: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
            hours,
        }
    }

    #[tokio::test]
    async fn upsert_is_last_write_wins() {
        let manager = test_manager().await;

        manager
            .save_or_update_entries(&[entry("2019-01-07", 4.0)])
            .await
            .unwrap();
        manager
            .save_or_update_entries(&[entry("2019-01-07", 6.5)])
            .await
            .unwrap();

        let entries = manager
            .entries_for_range(
                1,
                1,
                NaiveDate::from_ymd_opt(2019, 1, 7).unwrap(),
                NaiveDate::from_ymd_opt(2019, 1, 13).unwrap(),
            )
            .await
            .unwrap();

        // Never two rows for the same key
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, 6.5);
        assert_eq!(entries[0].client_name, "Acme");
        assert_eq!(entries[0].project_name, "Website");
        assert_eq!(entries[0].task_name, "Development");
    }

    #[tokio::test]
    async fn negative_hours_clamp_to_zero() {
        let manager = test_manager().await;

        manager
            .save_or_update_entries(&[entry("2019-01-07", -3.0)])
            .await
            .unwrap();

        let entries = manager
            .entries_for_range(
                1,
                1,
                NaiveDate::from_ymd_opt(2019, 1, 7).unwrap(),
                NaiveDate::from_ymd_opt(2019, 1, 7).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(entries[0].hours, 0.0);
    }

    #[tokio::test]
    async fn update_falls_back_to_insert_and_caps_hours() {
        let manager = test_manager().await;

        // No row yet: update path inserts
        manager
            .update_entries(&[entry("2019-01-08", 12000.0)])
            .await
            .unwrap();

        let entries = manager
            .entries_for_range(
                1,
                1,
                NaiveDate::from_ymd_opt(2019, 1, 8).unwrap(),
                NaiveDate::from_ymd_opt(2019, 1, 8).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, 9999.0);

        // Row exists now: update path overwrites
        manager
            .update_entries(&[entry("2019-01-08", 7.25)])
            .await
            .unwrap();
        let entries = manager
            .entries_for_range(
                1,
                1,
                NaiveDate::from_ymd_opt(2019, 1, 8).unwrap(),
                NaiveDate::from_ymd_opt(2019, 1, 8).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, 7.25);
    }

    #[tokio::test]
    async fn initial_entries_cover_every_day() {
        let manager = test_manager().await;

        let start = NaiveDate::from_ymd_opt(2019, 1, 7).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 1, 13).unwrap();
        manager
            .add_initial_entries(1, 1, start, end, 1, 1)
            .await
            .unwrap();

        let entries = manager.entries_for_range(1, 1, start, end).await.unwrap();
        assert_eq!(entries.len(), 7);
        assert!(entries.iter().all(|e| e.hours == 0.0));
        assert_eq!(entries.first().unwrap().day, start);
        assert_eq!(entries.last().unwrap().day, end);
    }

    #[tokio::test]
    async fn initial_entries_roll_back_on_conflict() {
        let manager = test_manager().await;

        let start = NaiveDate::from_ymd_opt(2019, 1, 7).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 1, 13).unwrap();

        // A pre-existing row mid-range makes the plain insert fail
        manager
            .save_or_update_entries(&[entry("2019-01-10", 2.0)])
            .await
            .unwrap();

        let result = manager.add_initial_entries(1, 1, start, end, 1, 1).await;
        assert!(result.is_err());

        // All-or-nothing: only the pre-existing row remains
        let entries = manager.entries_for_range(1, 1, start, end).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, 2.0);
    }

    #[tokio::test]
    async fn delete_with_no_match_is_a_client_error() {
        let manager = test_manager().await;

        let start = NaiveDate::from_ymd_opt(2019, 1, 7).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 1, 13).unwrap();

        let err = manager
            .delete_project_for_dates(1, 1, 1, 1, start, end)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidField);

        manager
            .save_or_update_entries(&[entry("2019-01-09", 3.0)])
            .await
            .unwrap();
        manager
            .delete_project_for_dates(1, 1, 1, 1, start, end)
            .await
            .unwrap();

        let entries = manager.entries_for_range(1, 1, start, end).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn empty_batches_are_no_ops() {
        let manager = test_manager().await;
        manager.save_or_update_entries(&[]).await.unwrap();
        manager.update_entries(&[]).await.unwrap();
    }
}
