use crate::{
    auth,
    config::ServerConfig,
    db::account::{
        AuthProfile, ForgotPassword, Profile, Session, MISSING_IP_ADDRESS,
    },
    error::{ApiError, ApiResult, ErrorCode},
    mailer::Mailer,
};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

const AUTH_PROFILE_COLUMNS: &str = "\
    p.profile_id, p.email, p.password, p.first_name, p.last_name, p.phone, \
    p.profile_status, p.timezone, p.locked_until, \
    a.account_id, a.company, a.account_status, a.week_start, a.account_timezone, \
    a.close_reason, a.created, a.updated, \
    pa.role, pa.profile_account_status";

/// Login, logout, token validation and the recovery/invitation token flows.
#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    mailer: Arc<Mailer>,
}

impl SessionManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>, mailer: Arc<Mailer>) -> Self {
        Self { db, config, mailer }
    }

    /// Authenticate a person and open a session on their most recently used
    /// account. Failed attempts are recorded and repeated failures within the
    /// configured window lock the profile.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip_address: &str,
    ) -> ApiResult<AuthProfile> {
        let email = email.to_lowercase();

        let Some(mut auth) = self.profile_by_email(&email).await? else {
            return Err(ApiError::field(
                ErrorCode::ProfileNotFound,
                format!("No user found for email: {email}"),
                "email",
            ));
        };

        if let Some(locked_until) = auth.profile.locked_until {
            if locked_until > Utc::now() {
                return Err(ApiError::new(ErrorCode::ProfileLocked, "Profile locked")
                    .with_detail("until", locked_until.to_rfc3339()));
            }
        }

        if !auth.profile.profile_status.is_active() {
            return Err(ApiError::new(ErrorCode::ProfileInactive, "Profile not valid")
                .with_detail("status", auth.profile.profile_status.as_str()));
        }

        if !auth::verify_password(password, &auth.profile.password_hash) {
            self.handle_failed_login(&email, ip_address).await;
            return Err(ApiError::field(
                ErrorCode::IncorrectPassword,
                "Incorrect password",
                "password",
            ));
        }

        let session = self
            .start_session(auth.profile.profile_id, auth.account.account_id)
            .await?;
        auth.session = Some(session);

        Ok(auth)
    }

    /// Bookkeeping after a wrong password. All of it is best-effort; the
    /// caller returns IncorrectPassword regardless.
    async fn handle_failed_login(&self, email: &str, ip_address: &str) {
        if let Err(err) = self.add_failed_login_attempt(email, ip_address).await {
            tracing::error!(error = %err, "could not record failed login attempt");
        }

        match self.failed_login_count(email).await {
            Ok(count) => {
                let max_attempts = self.config.session.max_failed_login_attempts;
                tracing::debug!(count, max_attempts, "failed login attempt");

                if count >= max_attempts {
                    if let Err(err) = self.lock_profile(email).await {
                        tracing::error!(error = %err, "could not lock profile");
                    }
                }
            }
            Err(err) => tracing::error!(error = %err, "could not get failed login count"),
        }
    }

    async fn add_failed_login_attempt(&self, email: &str, ip_address: &str) -> ApiResult<()> {
        let ip_address = if ip_address.is_empty() {
            MISSING_IP_ADDRESS
        } else {
            ip_address
        };

        let result = sqlx::query(
            "INSERT INTO login_attempts (email, ip_address, login_attempt_time) VALUES (?1, ?2, ?3)",
        )
        .bind(email)
        .bind(ip_address)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::system("No rows inserted into login_attempts"));
        }

        Ok(())
    }

    /// Failed attempts within the rolling failure window.
    async fn failed_login_count(&self, email: &str) -> ApiResult<i64> {
        let window_start =
            Utc::now() - Duration::minutes(self.config.session.login_failure_window_minutes);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM login_attempts WHERE email = ?1 AND login_attempt_time > ?2",
        )
        .bind(email)
        .bind(window_start)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    async fn lock_profile(&self, email: &str) -> ApiResult<()> {
        let lock_expiration =
            Utc::now() + Duration::minutes(self.config.session.profile_lock_duration_minutes);

        let result = sqlx::query("UPDATE profile SET locked_until = ?1 WHERE email = ?2")
            .bind(lock_expiration)
            .bind(email)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::system("Profile lock duration not updated"));
        }

        Ok(())
    }

    /// Generate a fresh token and upsert the session row; a token collision
    /// only refreshes the expiration. Also touches last_used on the
    /// membership so the account stays the login default.
    async fn start_session(&self, profile_id: i64, account_id: i64) -> ApiResult<Session> {
        let token = auth::generate_token(self.config.session.token_length);
        let expiration = auth::expiration_from_now(self.config.session.token_expiration_minutes);

        sqlx::query(
            "INSERT INTO session (token, token_expiration, profile_id, account_id, type) \
             VALUES (?1, ?2, ?3, ?4, 'web') \
             ON CONFLICT (token) DO UPDATE SET token_expiration = excluded.token_expiration",
        )
        .bind(&token)
        .bind(expiration)
        .bind(profile_id)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        sqlx::query(
            "UPDATE profile_account SET last_used = ?1 WHERE profile_id = ?2 AND account_id = ?3",
        )
        .bind(Utc::now())
        .bind(profile_id)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        Ok(Session {
            token,
            token_expiration: Some(expiration),
            session_type: "web".to_string(),
        })
    }

    /// Delete the session. Idempotent: a token that matched nothing is only
    /// worth a log line.
    pub async fn logout(&self, token: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM session WHERE token = ?1")
            .bind(token)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("no session rows deleted for token");
        }

        Ok(())
    }

    /// Full session gate: resolve the token, require an active profile and an
    /// unexpired session, and slide the expiration forward when less than
    /// half the configured lifetime remains.
    pub async fn authorize(&self, token: &str) -> ApiResult<AuthProfile> {
        let Some(auth) = self.profile_by_token(token).await? else {
            return Err(
                ApiError::new(ErrorCode::ProfileNotFound, "No profile for token")
                    .with_status(StatusCode::UNAUTHORIZED),
            );
        };

        if !auth.profile.profile_status.is_active() {
            return Err(ApiError::new(ErrorCode::ProfileInactive, "Profile not active")
                .with_detail("status", auth.profile.profile_status.as_str()));
        }

        let session = auth
            .session
            .as_ref()
            .ok_or_else(|| ApiError::new(ErrorCode::TokenExpired, "Session expired"))?;

        let Some(expiration) = session.token_expiration else {
            return Err(ApiError::new(ErrorCode::TokenExpired, "Session expired"));
        };

        if expiration < Utc::now() {
            return Err(ApiError::new(ErrorCode::TokenExpired, "Session expired"));
        }

        let lifetime = self.config.session.token_expiration_minutes;
        let remaining = expiration - Utc::now();
        if remaining.num_minutes() < lifetime / 2 {
            // Extend off the request path; a failed extension is not fatal.
            let manager = self.clone();
            let token = token.to_string();
            tokio::spawn(async move {
                let extended = auth::expiration_from_now(manager.config.session.token_expiration_minutes);
                if let Err(err) = manager.update_token_expiration(&token, extended).await {
                    tracing::error!(error = %err, "failed to update session expiration");
                }
            });
        }

        Ok(auth)
    }

    pub async fn update_token_expiration(
        &self,
        token: &str,
        expiration: chrono::DateTime<Utc>,
    ) -> ApiResult<()> {
        if token.is_empty() {
            return Err(ApiError::new(ErrorCode::MissingToken, "Empty token"));
        }

        let result = sqlx::query("UPDATE session SET token_expiration = ?1 WHERE token = ?2")
            .bind(expiration)
            .bind(token)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::system("Session expiration not updated"));
        }

        Ok(())
    }

    /// Issue a single-use reset token and mail the reset link. The token
    /// persists even when the mail fails to send.
    pub async fn forgot_password(&self, email: &str) -> ApiResult<()> {
        let email = email.to_lowercase();

        let Some(auth) = self.profile_by_email(&email).await? else {
            return Err(ApiError::new(ErrorCode::ProfileNotFound, "No profile"));
        };

        let token = auth::generate_token(self.config.session.forgot_password_token_length);
        let expiration =
            auth::expiration_from_now(self.config.session.forgot_password_expiration_minutes);
        self.set_forgot_password(auth.profile.profile_id, &token, expiration)
            .await?;

        let reset_url = format!(
            "{}/reset-password?verify-token={}",
            self.config.service.application_url, token
        );

        self.mailer
            .send_forgot_password_email(&auth.profile.first_name, &auth.profile.email, &reset_url)
            .await
            .map_err(|err| ApiError::system("Failed to send email").with_source(err))?;

        Ok(())
    }

    /// Check a reset token and, when configured, burn it so a second
    /// validation fails.
    pub async fn validate_forgot_token(&self, token: &str) -> ApiResult<()> {
        let Some(forgot) = self.forgot_password_by_token(token).await? else {
            return Err(ApiError::new(
                ErrorCode::InvalidForgotToken,
                "Invalid forgot password token",
            ));
        };

        if !Self::forgot_token_current(&forgot) {
            return Err(ApiError::new(
                ErrorCode::InvalidForgotToken,
                "Expired or invalid forgot password token",
            ));
        }

        if self.config.session.clear_forgot_password_on_validate {
            self.clear_forgot_password(forgot.profile_id).await?;
        }

        Ok(())
    }

    /// Invited-user completion: burn the token, store the chosen password and
    /// activate the profile.
    pub async fn setup_new_user(&self, token: &str, password: &str) -> ApiResult<()> {
        let Some(forgot) = self.forgot_password_by_token(token).await? else {
            return Err(ApiError::new(ErrorCode::InvalidToken, "Missing new user token"));
        };

        if !Self::forgot_token_current(&forgot) {
            return Err(ApiError::new(
                ErrorCode::TokenExpired,
                "Expired or invalid new user token",
            ));
        }

        self.clear_forgot_password(forgot.profile_id).await?;

        let password_hash = auth::hash_password(password)?;
        self.update_password_hash(forgot.profile_id, &password_hash)
            .await?;

        sqlx::query(
            "UPDATE profile SET profile_status = 'valid', updated = ?1 WHERE profile_id = ?2",
        )
        .bind(Utc::now())
        .bind(forgot.profile_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Self-service password change; requires the current password.
    pub async fn update_password(
        &self,
        profile_id: i64,
        current_password: &str,
        password: &str,
        confirm_password: &str,
    ) -> ApiResult<()> {
        if password.is_empty() {
            return Err(ApiError::new(ErrorCode::InvalidPassword, "Empty password"));
        }

        if password != confirm_password {
            return Err(ApiError::new(
                ErrorCode::PasswordMismatch,
                "Confirm password does not match",
            ));
        }

        let stored: Option<String> =
            sqlx::query_scalar("SELECT password FROM profile WHERE profile_id = ?1")
                .bind(profile_id)
                .fetch_optional(&self.db)
                .await?;

        let stored = stored.unwrap_or_default();
        if !auth::verify_password(current_password, &stored) {
            return Err(ApiError::new(
                ErrorCode::InvalidPassword,
                "Passwords do not match",
            ));
        }

        let password_hash = auth::hash_password(password)?;
        self.update_password_hash(profile_id, &password_hash).await
    }

    /// Store a reset/invitation token on the profile. Used both by the
    /// forgot-password flow and by admin invitations.
    pub async fn set_forgot_password(
        &self,
        profile_id: i64,
        token: &str,
        expiration: chrono::DateTime<Utc>,
    ) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE profile SET forgot_password_token = ?1, forgot_password_expiration = ?2 \
             WHERE profile_id = ?3",
        )
        .bind(token)
        .bind(expiration)
        .bind(profile_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::system("Profile forgot password not updated"));
        }

        Ok(())
    }

    async fn clear_forgot_password(&self, profile_id: i64) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE profile SET forgot_password_token = NULL, forgot_password_expiration = NULL \
             WHERE profile_id = ?1",
        )
        .bind(profile_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::system("Profile forgot password not cleared"));
        }

        Ok(())
    }

    async fn update_password_hash(&self, profile_id: i64, password_hash: &str) -> ApiResult<()> {
        let result =
            sqlx::query("UPDATE profile SET password = ?1, updated = ?2 WHERE profile_id = ?3")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(profile_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::system("No values in profile were updated"));
        }

        Ok(())
    }

    async fn forgot_password_by_token(&self, token: &str) -> ApiResult<Option<ForgotPassword>> {
        let forgot = sqlx::query_as::<_, ForgotPassword>(
            "SELECT profile_id, forgot_password_expiration FROM profile \
             WHERE forgot_password_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        Ok(forgot)
    }

    fn forgot_token_current(forgot: &ForgotPassword) -> bool {
        forgot
            .forgot_password_expiration
            .map(|expiration| expiration > Utc::now())
            .unwrap_or(false)
    }

    /// Profile joined with its most recently used account membership.
    pub async fn profile_by_email(&self, email: &str) -> ApiResult<Option<AuthProfile>> {
        if email.is_empty() {
            return Err(ApiError::field(ErrorCode::MissingField, "Missing email", "email"));
        }

        let query = format!(
            "SELECT {AUTH_PROFILE_COLUMNS} \
             FROM profile p \
             JOIN profile_account pa ON pa.profile_id = p.profile_id \
             JOIN account a ON a.account_id = pa.account_id \
             WHERE p.email = ?1 \
             ORDER BY pa.last_used DESC \
             LIMIT 1"
        );

        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|row| Self::map_auth_profile(&row, false)))
    }

    /// Profile and account resolved from a session token.
    pub async fn profile_by_token(&self, token: &str) -> ApiResult<Option<AuthProfile>> {
        let query = format!(
            "SELECT {AUTH_PROFILE_COLUMNS}, \
                    s.token, s.token_expiration, s.type AS session_type \
             FROM session s \
             JOIN profile p ON p.profile_id = s.profile_id \
             JOIN account a ON a.account_id = s.account_id \
             JOIN profile_account pa \
               ON pa.profile_id = p.profile_id AND pa.account_id = a.account_id \
             WHERE s.token = ?1"
        );

        let row = sqlx::query(&query)
            .bind(token)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|row| Self::map_auth_profile(&row, true)))
    }

    fn map_auth_profile(row: &sqlx::sqlite::SqliteRow, with_session: bool) -> AuthProfile {
        let profile = Profile {
            profile_id: row.get("profile_id"),
            email: row.get("email"),
            password_hash: row.get("password"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            phone: row.get("phone"),
            profile_status: row.get("profile_status"),
            timezone: row.get("timezone"),
            locked_until: row.get("locked_until"),
        };

        let account = crate::db::account::Account {
            account_id: row.get("account_id"),
            company: row.get("company"),
            account_status: row.get("account_status"),
            week_start: row.get("week_start"),
            account_timezone: row.get("account_timezone"),
            close_reason: row.get("close_reason"),
            created: row.get("created"),
            updated: row.get("updated"),
        };

        let session = with_session.then(|| Session {
            token: row.get("token"),
            token_expiration: row.get("token_expiration"),
            session_type: row.get("session_type"),
        });

        AuthProfile {
            profile,
            account,
            role: row.get("role"),
            profile_account_status: row.get("profile_account_status"),
            session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_manager() -> SessionManager {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let mut config = ServerConfig::default();
        config.session.max_failed_login_attempts = 5;
        config.session.login_failure_window_minutes = 30;
        config.session.profile_lock_duration_minutes = 5;

        SessionManager::new(
            pool,
            Arc::new(config),
            Arc::new(Mailer::new(None).unwrap()),
        )
    }

    /// Account + profile + membership, returning (profile_id, account_id).
    async fn seed_profile(
        manager: &SessionManager,
        email: &str,
        password: &str,
        profile_status: &str,
    ) -> (i64, i64) {
        let now = Utc::now();

        let account_id: i64 = sqlx::query_scalar(
            "INSERT INTO account (company, account_status, account_timezone, created, updated) \
             VALUES ('Test Co', 'valid', 'America/New_York', ?1, ?1) RETURNING account_id",
        )
        .bind(now)
        .fetch_one(&manager.db)
        .await
        .unwrap();

        let password_hash = auth::hash_password(password).unwrap();
        let profile_id: i64 = sqlx::query_scalar(
            "INSERT INTO profile \
             (email, password, first_name, last_name, profile_status, timezone, created, updated) \
             VALUES (?1, ?2, 'Test', 'User', ?3, 'America/New_York', ?4, ?4) \
             RETURNING profile_id",
        )
        .bind(email)
        .bind(&password_hash)
        .bind(profile_status)
        .bind(now)
        .fetch_one(&manager.db)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO profile_account \
             (profile_id, account_id, role, profile_account_status, last_used) \
             VALUES (?1, ?2, 'owner', 'valid', ?3)",
        )
        .bind(profile_id)
        .bind(account_id)
        .bind(now)
        .execute(&manager.db)
        .await
        .unwrap();

        (profile_id, account_id)
    }

    #[tokio::test]
    async fn login_success_attaches_session() {
        let manager = test_manager().await;
        seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        let auth = manager
            .login("Ada@Example.com", "correct-horse", "127.0.0.1")
            .await
            .unwrap();

        let session = auth.session.unwrap();
        assert!(!session.token.is_empty());
        assert!(session.token_expiration.unwrap() > Utc::now());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session WHERE token = ?1")
            .bind(&session.token)
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn login_unknown_email() {
        let manager = test_manager().await;

        let err = manager
            .login("nobody@example.com", "whatever-pass", "127.0.0.1")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProfileNotFound);
    }

    #[tokio::test]
    async fn login_inactive_profile() {
        let manager = test_manager().await;
        seed_profile(&manager, "invited@example.com", "some-password", "not-verified").await;

        let err = manager
            .login("invited@example.com", "some-password", "127.0.0.1")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProfileInactive);
    }

    #[tokio::test]
    async fn lockout_after_repeated_failures() {
        let manager = test_manager().await;
        seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        for _ in 0..5 {
            let err = manager
                .login("ada@example.com", "wrong-password", "10.0.0.1")
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::IncorrectPassword);
        }

        // The lock now rejects even the correct password
        let err = manager
            .login("ada@example.com", "correct-horse", "10.0.0.1")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProfileLocked);
    }

    #[tokio::test]
    async fn failed_attempts_record_missing_ip() {
        let manager = test_manager().await;
        seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        manager
            .login("ada@example.com", "wrong-password", "")
            .await
            .unwrap_err();

        let ip: String = sqlx::query_scalar("SELECT ip_address FROM login_attempts LIMIT 1")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(ip, MISSING_IP_ADDRESS);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let manager = test_manager().await;
        seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        let auth = manager
            .login("ada@example.com", "correct-horse", "127.0.0.1")
            .await
            .unwrap();
        let token = auth.session.unwrap().token;

        manager.logout(&token).await.unwrap();
        manager.logout(&token).await.unwrap();
        manager.logout("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn authorize_round_trip_and_expiry() {
        let manager = test_manager().await;
        let (profile_id, account_id) =
            seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        let auth = manager
            .login("ada@example.com", "correct-horse", "127.0.0.1")
            .await
            .unwrap();
        let token = auth.session.unwrap().token;

        let resolved = manager.authorize(&token).await.unwrap();
        assert_eq!(resolved.profile.profile_id, profile_id);
        assert_eq!(resolved.account.account_id, account_id);

        // Unknown token
        let err = manager.authorize("bogus-token").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ProfileNotFound);

        // Expired token
        manager
            .update_token_expiration(&token, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();
        let err = manager.authorize(&token).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
    }

    #[tokio::test]
    async fn session_upsert_refreshes_expiration() {
        let manager = test_manager().await;
        let (profile_id, account_id) =
            seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        let first = Utc::now() + Duration::minutes(10);
        let second = Utc::now() + Duration::minutes(99);

        for expiration in [first, second] {
            sqlx::query(
                "INSERT INTO session (token, token_expiration, profile_id, account_id, type) \
                 VALUES ('fixed-token', ?1, ?2, ?3, 'web') \
                 ON CONFLICT (token) DO UPDATE SET token_expiration = excluded.token_expiration",
            )
            .bind(expiration)
            .bind(profile_id)
            .bind(account_id)
            .execute(&manager.db)
            .await
            .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let stored: chrono::DateTime<Utc> =
            sqlx::query_scalar("SELECT token_expiration FROM session WHERE token = 'fixed-token'")
                .fetch_one(&manager.db)
                .await
                .unwrap();
        assert!((stored - second).num_seconds().abs() < 2);
    }

    #[tokio::test]
    async fn forgot_password_token_is_single_use() {
        let manager = test_manager().await;
        let (profile_id, _) =
            seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        manager.forgot_password("ada@example.com").await.unwrap();

        let token: String = sqlx::query_scalar(
            "SELECT forgot_password_token FROM profile WHERE profile_id = ?1",
        )
        .bind(profile_id)
        .fetch_one(&manager.db)
        .await
        .unwrap();

        manager.validate_forgot_token(&token).await.unwrap();

        // Cleared on first validation
        let err = manager.validate_forgot_token(&token).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidForgotToken);
    }

    #[tokio::test]
    async fn forgot_password_unknown_email() {
        let manager = test_manager().await;

        let err = manager.forgot_password("nobody@example.com").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ProfileNotFound);
    }

    #[tokio::test]
    async fn expired_forgot_token_rejected() {
        let manager = test_manager().await;
        let (profile_id, _) =
            seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        manager
            .set_forgot_password(profile_id, "stale-token", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let err = manager.validate_forgot_token("stale-token").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidForgotToken);
    }

    #[tokio::test]
    async fn setup_new_user_activates_profile() {
        let manager = test_manager().await;
        let (profile_id, _) =
            seed_profile(&manager, "invited@example.com", "placeholder", "not-verified").await;

        manager
            .set_forgot_password(profile_id, "invite-token", Utc::now() + Duration::minutes(30))
            .await
            .unwrap();

        manager
            .setup_new_user("invite-token", "chosen-password")
            .await
            .unwrap();

        let auth = manager
            .login("invited@example.com", "chosen-password", "127.0.0.1")
            .await
            .unwrap();
        assert!(auth.profile.profile_status.is_active());

        // Token burned
        let err = manager
            .setup_new_user("invite-token", "another-password")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
    }

    #[tokio::test]
    async fn update_password_requires_current() {
        let manager = test_manager().await;
        let (profile_id, _) =
            seed_profile(&manager, "ada@example.com", "correct-horse", "valid").await;

        let err = manager
            .update_password(profile_id, "wrong-current", "new-password", "new-password")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPassword);

        let err = manager
            .update_password(profile_id, "correct-horse", "new-password", "different")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PasswordMismatch);

        manager
            .update_password(profile_id, "correct-horse", "new-password", "new-password")
            .await
            .unwrap();

        manager
            .login("ada@example.com", "new-password", "127.0.0.1")
            .await
            .unwrap();
    }
}
