/// Self-service profile endpoints
use crate::{
    account::UpdateProfileData,
    api::{account::ProfileResponse, data, empty, ApiJson, DataBody},
    auth::AuthSession,
    context::AppContext,
    error::{ApiError, ApiResult, ErrorCode},
    validation,
};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/password", put(update_password))
}

async fn get_profile(session: AuthSession) -> ApiResult<Json<DataBody<ProfileResponse>>> {
    Ok(data(ProfileResponse::new(
        &session.auth.profile,
        &session.auth.account.company,
    )))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ProfileRequest>,
) -> ApiResult<Json<DataBody<ProfileResponse>>> {
    if let Some(email) = &request.email {
        if !validation::is_email(&email.to_lowercase()) {
            return Err(ApiError::field(ErrorCode::InvalidEmail, "Invalid email", "email"));
        }
    }

    if let Some(first_name) = &request.first_name {
        if !validation::is_length(
            first_name,
            validation::NAME_MIN_LENGTH,
            validation::NAME_MAX_LENGTH,
        ) {
            return Err(ApiError::field(
                ErrorCode::FieldSize,
                "First name must be between 1 and 64 characters",
                "firstName",
            ));
        }
    }

    if let Some(last_name) = &request.last_name {
        if !validation::is_length(
            last_name,
            validation::NAME_MIN_LENGTH,
            validation::NAME_MAX_LENGTH,
        ) {
            return Err(ApiError::field(
                ErrorCode::FieldSize,
                "Last name must be between 1 and 64 characters",
                "lastName",
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

    let updated = ctx
        .accounts
        .update_profile(
            &session.auth.profile,
            &UpdateProfileData {
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                timezone: request.timezone,
            },
        )
        .await?;

    Ok(data(ProfileResponse::new(
        &updated,
        &session.auth.account.company,
    )))
}

async fn update_password(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<PasswordChangeRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if !validation::is_length(
        &request.current_password,
        validation::PASSWORD_MIN_LENGTH,
        validation::PASSWORD_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Invalid current password",
            "currentPassword",
        ));
    }

    if !validation::is_length(
        &request.password,
        validation::PASSWORD_MIN_LENGTH,
        validation::PASSWORD_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Invalid password field size",
            "password",
        ));
    }

    if !validation::is_length(
        &request.confirm_password,
        validation::PASSWORD_MIN_LENGTH,
        validation::PASSWORD_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Invalid confirm password field size",
            "confirmPassword",
        ));
    }

    ctx.sessions
        .update_password(
            session.auth.profile.profile_id,
            &request.current_password,
            &request.password,
            &request.confirm_password,
        )
        .await?;

    Ok(empty())
}
