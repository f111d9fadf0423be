use crate::{
    auth,
    config::{ServerConfig, DEFAULT_TIMEZONE},
    db::account::{Account, AccountStatus, Profile, ProfileStatus, Role, Session},
    error::{ApiError, ApiResult, ErrorCode},
    mailer::Mailer,
    session::SessionManager,
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CreateAccountData {
    pub company: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUserData {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Partial update: absent fields leave the stored values untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccountData {
    pub company: Option<String>,
    pub timezone: Option<String>,
    pub week_start: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfileData {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub timezone: Option<String>,
}

/// Account creation, membership management and profile maintenance.
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    sessions: Arc<SessionManager>,
    mailer: Arc<Mailer>,
}

impl AccountManager {
    pub fn new(
        db: SqlitePool,
        config: Arc<ServerConfig>,
        sessions: Arc<SessionManager>,
        mailer: Arc<Mailer>,
    ) -> Self {
        Self {
            db,
            config,
            sessions,
            mailer,
        }
    }

    /// Signup: create the tenant, reuse or create the profile, open a session
    /// for a brand new person, and grant the owner role. The same person may
    /// administer several accounts through one profile row.
    pub async fn create_account(
        &self,
        request: &CreateAccountData,
    ) -> ApiResult<(Account, Profile, Option<Session>)> {
        let email = request.email.to_lowercase();
        let timezone = request
            .timezone
            .clone()
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        let existing = self.find_profile(&email).await?;

        let password_hash = auth::hash_password(&request.password)?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let account_id: i64 = sqlx::query_scalar(
            "INSERT INTO account (company, account_status, account_timezone, created, updated) \
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING account_id",
        )
        .bind(&request.company)
        .bind(AccountStatus::Valid)
        .bind(&timezone)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            ApiError::new(ErrorCode::AccountCreateFailed, "Failed to create account").with_source(e)
        })?;

        let (profile, session) = match existing {
            Some(profile) => (profile, None),
            None => {
                let profile_id: i64 = sqlx::query_scalar(
                    "INSERT INTO profile \
                     (email, password, first_name, last_name, profile_status, timezone, created, updated) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) RETURNING profile_id",
                )
                .bind(&email)
                .bind(&password_hash)
                .bind(&request.first_name)
                .bind(&request.last_name)
                .bind(ProfileStatus::Valid)
                .bind(&timezone)
                .bind(now)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    ApiError::new(ErrorCode::ProfileCreateFailed, "Failed to create profile")
                        .with_source(e)
                })?;

                let token = auth::generate_token(self.config.session.token_length);
                let expiration =
                    auth::expiration_from_now(self.config.session.token_expiration_minutes);

                sqlx::query(
                    "INSERT INTO session (token, token_expiration, profile_id, account_id, type) \
                     VALUES (?1, ?2, ?3, ?4, 'web')",
                )
                .bind(&token)
                .bind(expiration)
                .bind(profile_id)
                .bind(account_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    ApiError::new(ErrorCode::ProfileCreateFailed, "Failed to create session")
                        .with_source(e)
                })?;

                let profile = Profile {
                    profile_id,
                    email: email.clone(),
                    password_hash,
                    first_name: request.first_name.clone(),
                    last_name: request.last_name.clone(),
                    phone: None,
                    profile_status: ProfileStatus::Valid,
                    timezone: timezone.clone(),
                    locked_until: None,
                };

                let session = Session {
                    token,
                    token_expiration: Some(expiration),
                    session_type: "web".to_string(),
                };

                (profile, Some(session))
            }
        };

        sqlx::query(
            "INSERT INTO profile_account \
             (profile_id, account_id, role, profile_account_status, last_used) \
             VALUES (?1, ?2, ?3, 'valid', ?4)",
        )
        .bind(profile.profile_id)
        .bind(account_id)
        .bind(Role::Owner)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiError::new(ErrorCode::ProfileCreateFailed, "Failed to add user to account")
                .with_source(e)
        })?;

        tx.commit().await?;

        let account = Account {
            account_id,
            company: request.company.clone(),
            account_status: AccountStatus::Valid,
            week_start: 1,
            account_timezone: timezone,
            close_reason: None,
            created: now,
            updated: now,
        };

        Ok((account, profile, session))
    }

    /// Invite a person into an account. A new person gets a not-verified
    /// profile with an unusable placeholder password and a setup token; an
    /// email already belonging to the account is rejected.
    pub async fn add_user(&self, request: &NewUserData, account: &Account) -> ApiResult<Profile> {
        let email = request.email.to_lowercase();

        let profile = match self.find_profile(&email).await? {
            Some(profile) => profile,
            None => {
                // Placeholder is a raw token; it can never verify as a password
                let placeholder = auth::generate_token(self.config.session.token_length);
                let now = Utc::now();

                let profile_id: i64 = sqlx::query_scalar(
                    "INSERT INTO profile \
                     (email, password, first_name, last_name, profile_status, timezone, created, updated) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) RETURNING profile_id",
                )
                .bind(&email)
                .bind(&placeholder)
                .bind(&request.first_name)
                .bind(&request.last_name)
                .bind(ProfileStatus::NotVerified)
                .bind(DEFAULT_TIMEZONE)
                .bind(now)
                .fetch_one(&self.db)
                .await
                .map_err(|e| {
                    ApiError::new(ErrorCode::ProfileCreateFailed, "Failed to add user").with_source(e)
                })?;

                let setup_token =
                    auth::generate_token(self.config.session.forgot_password_token_length);
                let expiration = auth::expiration_from_now(
                    self.config.session.add_user_token_expiration_minutes,
                );
                self.sessions
                    .set_forgot_password(profile_id, &setup_token, expiration)
                    .await?;

                let setup_url = format!(
                    "{}/new-user?verify-token={}",
                    self.config.service.application_url, setup_token
                );
                if let Err(err) = self
                    .mailer
                    .send_new_user_email(&request.first_name, &email, &setup_url)
                    .await
                {
                    tracing::error!(error = %err, "failed to send invitation email");
                }

                Profile {
                    profile_id,
                    email: email.clone(),
                    password_hash: placeholder,
                    first_name: request.first_name.clone(),
                    last_name: request.last_name.clone(),
                    phone: None,
                    profile_status: ProfileStatus::NotVerified,
                    timezone: DEFAULT_TIMEZONE.to_string(),
                    locked_until: None,
                }
            }
        };

        self.add_member(account.account_id, profile.profile_id, &email, request.role)
            .await?;

        Ok(profile)
    }

    /// Associate a profile with an account, rejecting duplicate membership.
    async fn add_member(
        &self,
        account_id: i64,
        profile_id: i64,
        email: &str,
        role: Role,
    ) -> ApiResult<()> {
        let already_member: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM profile p \
             JOIN profile_account pa ON pa.profile_id = p.profile_id \
             WHERE p.email = ?1 AND pa.account_id = ?2",
        )
        .bind(email)
        .bind(account_id)
        .fetch_one(&self.db)
        .await?;

        if already_member > 0 {
            return Err(ApiError::new(
                ErrorCode::EmailExistsInAccount,
                "Email exists in account",
            ));
        }

        let result = sqlx::query(
            "INSERT INTO profile_account \
             (profile_id, account_id, role, profile_account_status, last_used) \
             VALUES (?1, ?2, ?3, 'valid', ?4)",
        )
        .bind(profile_id)
        .bind(account_id)
        .bind(role)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(
                ErrorCode::ProfileCreateFailed,
                "Failed to add new user to account",
            ));
        }

        Ok(())
    }

    /// Drop a membership. The profile itself stays; it may belong to other
    /// accounts.
    pub async fn remove_user(&self, email: &str, account: &Account) -> ApiResult<()> {
        let email = email.to_lowercase();

        let Some(profile) = self.find_profile(&email).await? else {
            return Err(ApiError::new(
                ErrorCode::ProfileNotFound,
                "Failed to find user in account",
            ));
        };

        let result = sqlx::query(
            "DELETE FROM profile_account WHERE account_id = ?1 AND profile_id = ?2",
        )
        .bind(account.account_id)
        .bind(profile.profile_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(
                ErrorCode::ProfileNotFound,
                "Failed to find user in account",
            ));
        }

        Ok(())
    }

    /// Copy-then-selectively-overwrite: only provided fields replace stored
    /// values.
    pub async fn update_account(
        &self,
        account_id: i64,
        request: &UpdateAccountData,
    ) -> ApiResult<Account> {
        let Some(mut account) = self.account(account_id).await? else {
            return Err(ApiError::system("Failed to get current account"));
        };

        if let Some(company) = &request.company {
            account.company = company.clone();
        }
        if let Some(timezone) = &request.timezone {
            account.account_timezone = timezone.clone();
        }
        if let Some(week_start) = request.week_start {
            account.week_start = week_start;
        }
        account.updated = Utc::now();

        let result = sqlx::query(
            "UPDATE account SET company = ?1, week_start = ?2, account_timezone = ?3, updated = ?4 \
             WHERE account_id = ?5",
        )
        .bind(&account.company)
        .bind(account.week_start)
        .bind(&account.account_timezone)
        .bind(account.updated)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::UpdateFailed, "No account values updated"));
        }

        Ok(account)
    }

    pub async fn close_account(&self, account_id: i64, reason: &str) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE account SET account_status = ?1, close_reason = ?2, updated = ?3 \
             WHERE account_id = ?4",
        )
        .bind(AccountStatus::Archived)
        .bind(reason)
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::new(ErrorCode::UpdateFailed, "Failed to close account"));
        }

        Ok(())
    }

    /// Account by id, hiding archived tenants.
    pub async fn account(&self, account_id: i64) -> ApiResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT account_id, company, account_status, week_start, account_timezone, \
                    close_reason, created, updated \
             FROM account WHERE account_id = ?1 AND account_status != ?2",
        )
        .bind(account_id)
        .bind(AccountStatus::Archived)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// All member profiles of an account.
    pub async fn profiles(&self, account_id: i64) -> ApiResult<Vec<Profile>> {
        let rows = sqlx::query(
            "SELECT p.profile_id, p.email, p.password, p.first_name, p.last_name, p.phone, \
                    p.profile_status, p.timezone, p.locked_until \
             FROM profile p \
             JOIN profile_account pa ON pa.profile_id = p.profile_id \
             WHERE pa.account_id = ?1 \
             ORDER BY LOWER(p.last_name), LOWER(p.first_name)",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.iter().map(Self::map_profile).collect())
    }

    /// Self-service profile update; a changed email must not collide with
    /// another person.
    pub async fn update_profile(
        &self,
        existing: &Profile,
        request: &UpdateProfileData,
    ) -> ApiResult<Profile> {
        let mut updated = existing.clone();

        if let Some(email) = &request.email {
            let email = email.to_lowercase();
            if email != existing.email {
                if self.find_profile(&email).await?.is_some() {
                    return Err(ApiError::new(
                        ErrorCode::AccountExists,
                        format!("Profile exists for email: {email}"),
                    ));
                }
                updated.email = email;
            }
        }
        if let Some(first_name) = &request.first_name {
            updated.first_name = first_name.clone();
        }
        if let Some(last_name) = &request.last_name {
            updated.last_name = last_name.clone();
        }
        if let Some(timezone) = &request.timezone {
            updated.timezone = timezone.clone();
        }

        let result = sqlx::query(
            "UPDATE profile \
             SET email = ?1, first_name = ?2, last_name = ?3, phone = ?4, timezone = ?5, updated = ?6 \
             WHERE profile_id = ?7",
        )
        .bind(&updated.email)
        .bind(&updated.first_name)
        .bind(&updated.last_name)
        .bind(&updated.phone)
        .bind(&updated.timezone)
        .bind(Utc::now())
        .bind(updated.profile_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::system("No values in profile were updated"));
        }

        Ok(updated)
    }

    /// Bare profile lookup by email, no membership join.
    pub async fn find_profile(&self, email: &str) -> ApiResult<Option<Profile>> {
        let row = sqlx::query(
            "SELECT profile_id, email, password, first_name, last_name, phone, \
                    profile_status, timezone, locked_until \
             FROM profile WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.as_ref().map(Self::map_profile))
    }

    fn map_profile(row: &sqlx::sqlite::SqliteRow) -> Profile {
        Profile {
            profile_id: row.get("profile_id"),
            email: row.get("email"),
            password_hash: row.get("password"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            phone: row.get("phone"),
            profile_status: row.get("profile_status"),
            timezone: row.get("timezone"),
            locked_until: row.get("locked_until"),
        }
    }
}
