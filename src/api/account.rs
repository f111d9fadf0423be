/// Account signup and admin-only account/membership management
use crate::{
    account::{CreateAccountData, NewUserData, UpdateAccountData},
    api::{data, empty, ApiJson, DataBody},
    auth::{require_active_account, session_cookie, AdminSession},
    context::AppContext,
    db::account::{Account, Profile, Role},
    error::{ApiError, ApiResult, ErrorCode},
    validation,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{CookieJar, WithRejection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAccountRequest {
    pub company: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub company: Option<String>,
    pub timezone: Option<String>,
    pub week_start: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CloseAccountRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AddUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoveUserRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl ProfileResponse {
    pub fn new(profile: &Profile, company: &str) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            company: company.to_string(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            timezone: Some(profile.timezone.clone()).filter(|tz| !tz.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub company: String,
    pub week_start: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub created: String,
    pub updated: String,
}

impl AccountResponse {
    fn new(account: &Account) -> Self {
        Self {
            company: account.company.clone(),
            week_start: account.week_start,
            timezone: Some(account.account_timezone.clone()).filter(|tz| !tz.is_empty()),
            created: account.created.to_rfc3339(),
            updated: account.updated.to_rfc3339(),
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(create_account).get(get_account).put(update_account).delete(close_account))
        .route("/users", get(get_users))
        .route("/user", post(add_user).delete(remove_user))
}

async fn create_account(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    WithRejection(Json(request), _): ApiJson<CreateAccountRequest>,
) -> ApiResult<(CookieJar, Json<DataBody<ProfileResponse>>)> {
    if !validation::is_email(&request.email) {
        return Err(ApiError::field(ErrorCode::InvalidEmail, "Invalid email", "email"));
    }

    if !validation::is_length(
        &request.password,
        validation::PASSWORD_MIN_LENGTH,
        validation::PASSWORD_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Password must be between 8 and 64 characters",
            "password",
        ));
    }

    if !validation::is_length(
        &request.first_name,
        validation::NAME_MIN_LENGTH,
        validation::NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "First name must be between 1 and 64 characters",
            "firstName",
        ));
    }

    if !validation::is_length(
        &request.last_name,
        validation::NAME_MIN_LENGTH,
        validation::NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Last name must be between 1 and 64 characters",
            "lastName",
        ));
    }

    if !validation::is_length(
        &request.company,
        validation::COMPANY_NAME_MIN_LENGTH,
        validation::COMPANY_NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Company name must be between 1 and 64 characters",
            "company",
        ));
    }

    if let Some(timezone) = &request.timezone {
        if !validation::is_timezone(timezone) {
            return Err(ApiError::field(
                ErrorCode::InvalidTimezone,
                "Invalid timezone",
                "timezone",
            ));
        }
    }

    let (account, profile, session) = ctx
        .accounts
        .create_account(&CreateAccountData {
            company: request.company,
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
            timezone: request.timezone,
        })
        .await?;

    let jar = match &session {
        Some(session) => jar.add(session_cookie(&ctx.config.session, &session.token)),
        None => jar,
    };

    Ok((jar, data(ProfileResponse::new(&profile, &account.company))))
}

async fn get_account(
    State(ctx): State<AppContext>,
    session: AdminSession,
) -> ApiResult<Json<DataBody<AccountResponse>>> {
    let account = ctx
        .accounts
        .account(session.auth.account.account_id)
        .await?
        .ok_or_else(|| {
            ApiError::new(ErrorCode::AccountInactive, "No account found")
                .with_status(StatusCode::BAD_REQUEST)
        })?;

    Ok(data(AccountResponse::new(&account)))
}

async fn update_account(
    State(ctx): State<AppContext>,
    session: AdminSession,
    WithRejection(Json(request), _): ApiJson<UpdateAccountRequest>,
) -> ApiResult<Json<DataBody<AccountResponse>>> {
    if let Some(company) = &request.company {
        if !validation::is_length(
            company,
            validation::COMPANY_NAME_MIN_LENGTH,
            validation::COMPANY_NAME_MAX_LENGTH,
        ) {
            return Err(ApiError::field(
                ErrorCode::FieldSize,
                "Company name must be between 1 and 64 characters",
                "company",
            ));
        }
    }

    if let Some(week_start) = request.week_start {
        if !validation::is_week_start(week_start) {
            return Err(ApiError::field(
                ErrorCode::InvalidWeekStart,
                "Invalid week start",
                "weekStart",
            ));
        }
    }

    if let Some(timezone) = &request.timezone {
        if !validation::is_timezone(timezone) {
            return Err(ApiError::field(
                ErrorCode::InvalidTimezone,
                "Invalid timezone",
                "timezone",
            ));
        }
    }

    let account = ctx
        .accounts
        .update_account(
            session.auth.account.account_id,
            &UpdateAccountData {
                company: request.company,
                timezone: request.timezone,
                week_start: request.week_start,
            },
        )
        .await?;

    Ok(data(AccountResponse::new(&account)))
}

async fn close_account(
    State(ctx): State<AppContext>,
    session: AdminSession,
    WithRejection(Json(request), _): ApiJson<CloseAccountRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    require_active_account(&session.auth)?;

    if request.reason.is_empty() {
        return Err(ApiError::field(
            ErrorCode::MissingField,
            "Must include a valid reason for closing account",
            "reason",
        ));
    }

    ctx.accounts
        .close_account(session.auth.account.account_id, &request.reason)
        .await?;

    Ok(empty())
}

async fn get_users(
    State(ctx): State<AppContext>,
    session: AdminSession,
) -> ApiResult<Json<DataBody<Vec<ProfileResponse>>>> {
    require_active_account(&session.auth)?;

    let profiles = ctx
        .accounts
        .profiles(session.auth.account.account_id)
        .await?;

    let company = &session.auth.account.company;
    let users = profiles
        .iter()
        .map(|profile| ProfileResponse::new(profile, company))
        .collect();

    Ok(data(users))
}

async fn add_user(
    State(ctx): State<AppContext>,
    session: AdminSession,
    WithRejection(Json(request), _): ApiJson<AddUserRequest>,
) -> ApiResult<Json<DataBody<ProfileResponse>>> {
    require_active_account(&session.auth)?;

    if !validation::is_email(&request.email) {
        return Err(ApiError::field(ErrorCode::InvalidEmail, "Invalid email", "email"));
    }

    if !validation::is_length(
        &request.first_name,
        validation::NAME_MIN_LENGTH,
        validation::NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "First name must be between 1 and 64 characters",
            "firstName",
        ));
    }

    if !validation::is_length(
        &request.last_name,
        validation::NAME_MIN_LENGTH,
        validation::NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Last name must be between 1 and 64 characters",
            "lastName",
        ));
    }

    // Unknown role names quietly fall back to the plain member role
    let role = Role::parse(&request.role).unwrap_or(Role::User);

    let profile = ctx
        .accounts
        .add_user(
            &NewUserData {
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                role,
            },
            &session.auth.account,
        )
        .await?;

    Ok(data(ProfileResponse::new(
        &profile,
        &session.auth.account.company,
    )))
}

async fn remove_user(
    State(ctx): State<AppContext>,
    session: AdminSession,
    WithRejection(Json(request), _): ApiJson<RemoveUserRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    require_active_account(&session.auth)?;

    if request.email.is_empty() {
        return Err(ApiError::field(ErrorCode::InvalidField, "Invalid email", "email"));
    }

    ctx.accounts
        .remove_user(&request.email, &session.auth.account)
        .await?;

    Ok(empty())
}
