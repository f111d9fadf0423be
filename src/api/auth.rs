/// Authentication endpoints: login, logout, token checks and recovery
use crate::{
    api::{data, empty, ApiJson, DataBody},
    auth::{expired_session_cookie, session_cookie, AuthSession, RawToken},
    context::AppContext,
    db::account::AuthProfile,
    error::{ApiError, ApiResult, ErrorCode},
    validation,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    routing::{post, put},
    Json, Router,
};
use axum_extra::extract::{CookieJar, WithRejection};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgotPasswordTokenRequest {
    pub forgot_password_token: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupNewUserRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub week_start: i64,
}

impl AuthResponse {
    pub fn from_auth(auth: &AuthProfile) -> Self {
        Self {
            id: Some(auth.profile.profile_id),
            first_name: auth.profile.first_name.clone(),
            last_name: auth.profile.last_name.clone(),
            company: auth.account.company.clone(),
            week_start: auth.account.week_start,
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/login", post(login))
        .route("/forgot", post(forgot_password))
        .route("/forgot/validate", post(validate_forgot_token))
        .route("/setup", put(setup_new_user))
        .route("/token", post(validate_token))
        .route("/logout", post(logout))
}

fn client_ip(headers: &HeaderMap, connect_info: Option<&SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| connect_info.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    WithRejection(Json(request), _): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<DataBody<AuthResponse>>)> {
    if !validation::is_email(&request.email) {
        return Err(ApiError::field(ErrorCode::InvalidEmail, "Invalid email", "email"));
    }

    if !validation::is_length(
        &request.email,
        validation::EMAIL_MIN_LENGTH,
        validation::EMAIL_MAX_LENGTH,
    ) {
        return Err(ApiError::field(ErrorCode::FieldSize, "Invalid email length", "email"));
    }

    if !validation::is_length(
        &request.password,
        validation::PASSWORD_MIN_LENGTH,
        validation::PASSWORD_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Invalid password length",
            "password",
        ));
    }

    let ip_address = client_ip(&headers, connect_info.as_ref().map(|info| &info.0));

    // Every login failure is unauthorized on the wire
    let auth = ctx
        .sessions
        .login(&request.email, &request.password, &ip_address)
        .await
        .map_err(|err| err.with_status(StatusCode::UNAUTHORIZED))?;

    let token = auth
        .session
        .as_ref()
        .map(|session| session.token.clone())
        .unwrap_or_default();

    let jar = jar.add(session_cookie(&ctx.config.session, &token));
    Ok((jar, data(AuthResponse::from_auth(&auth))))
}

async fn logout(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    RawToken(token): RawToken,
) -> ApiResult<(CookieJar, Json<DataBody<()>>)> {
    ctx.sessions.logout(&token).await?;

    let jar = jar.remove(expired_session_cookie(&ctx.config.session));
    Ok((jar, empty()))
}

/// Refresh the caller's view of the session: full gates plus the sliding
/// expiration, returning the resolved profile summary.
async fn validate_token(session: AuthSession) -> ApiResult<Json<DataBody<AuthResponse>>> {
    Ok(data(AuthResponse::from_auth(&session.auth)))
}

async fn forgot_password(
    State(ctx): State<AppContext>,
    WithRejection(Json(request), _): ApiJson<EmailRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    tracing::info!(email = %request.email, "forgot password request");

    if !validation::is_email(&request.email) {
        return Err(ApiError::field(ErrorCode::InvalidEmail, "Invalid email", "email"));
    }

    ctx.sessions.forgot_password(&request.email).await?;

    Ok(empty())
}

async fn validate_forgot_token(
    State(ctx): State<AppContext>,
    WithRejection(Json(request), _): ApiJson<ForgotPasswordTokenRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.forgot_password_token.is_empty() {
        return Err(ApiError::field(
            ErrorCode::InvalidForgotToken,
            "Invalid forgot password token",
            "forgotPasswordToken",
        ));
    }

    ctx.sessions
        .validate_forgot_token(&request.forgot_password_token)
        .await?;

    Ok(empty())
}

async fn setup_new_user(
    State(ctx): State<AppContext>,
    WithRejection(Json(request), _): ApiJson<SetupNewUserRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.token.is_empty() {
        return Err(
            ApiError::field(ErrorCode::InvalidToken, "Missing token", "token")
                .with_status(StatusCode::BAD_REQUEST),
        );
    }

    if !validation::is_length(
        &request.password,
        validation::PASSWORD_MIN_LENGTH,
        validation::PASSWORD_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Invalid password length",
            "password",
        ));
    }

    ctx.sessions
        .setup_new_user(&request.token, &request.password)
        .await?;

    Ok(empty())
}
