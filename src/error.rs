/// Unified error type and the stable wire codes clients branch on
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Stable error codes. These strings are part of the API contract and are
/// consumed by clients for branching, not just display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    Panic,
    NotFound,
    MethodNotAllowed,

    InvalidJson,
    SystemError,

    EncryptionFailed,
    TokenCreationFailed,

    AccountExists,
    UpdateFailed,
    AccountCreateFailed,
    ProfileCreateFailed,
    EmailExistsInAccount,
    ProfileNotFound,
    InvalidEmail,
    InvalidForgotToken,
    InvalidPassword,
    PasswordMismatch,
    InvalidField,
    ProfileLocked,
    NotAuthorized,

    IncorrectPassword,
    InvalidToken,
    TokenExpired,
    MissingToken,

    ProfileInactive,
    AccountInactive,

    MissingField,
    FieldSize,

    InvalidWeekStart,
    InvalidRole,
    InvalidTimezone,

    InvalidClient,
    InvalidTask,
    InvalidProject,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Panic => "Panic",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::MethodNotAllowed => "MethodNotAllowed",
            ErrorCode::InvalidJson => "InvalidJson",
            ErrorCode::SystemError => "SystemError",
            ErrorCode::EncryptionFailed => "EncryptionFailed",
            ErrorCode::TokenCreationFailed => "TokenCreationFailed",
            ErrorCode::AccountExists => "AccountExists",
            ErrorCode::UpdateFailed => "UpdateFailed",
            ErrorCode::AccountCreateFailed => "AccountCreateFailed",
            ErrorCode::ProfileCreateFailed => "ProfileCreateFailed",
            ErrorCode::EmailExistsInAccount => "EmailExistsInAccount",
            ErrorCode::ProfileNotFound => "ProfileNotFound",
            ErrorCode::InvalidEmail => "InvalidEmail",
            ErrorCode::InvalidForgotToken => "InvalidForgotToken",
            ErrorCode::InvalidPassword => "InvalidPassword",
            ErrorCode::PasswordMismatch => "PasswordMismatch",
            ErrorCode::InvalidField => "InvalidField",
            ErrorCode::ProfileLocked => "ProfileLocked",
            ErrorCode::NotAuthorized => "NotAuthorized",
            ErrorCode::IncorrectPassword => "IncorrectPassword",
            ErrorCode::InvalidToken => "InvalidToken",
            ErrorCode::TokenExpired => "TokenExpired",
            ErrorCode::MissingToken => "MissingToken",
            ErrorCode::ProfileInactive => "ProfileInactive",
            ErrorCode::AccountInactive => "AccountInactive",
            ErrorCode::MissingField => "MissingField",
            ErrorCode::FieldSize => "FieldSize",
            ErrorCode::InvalidWeekStart => "InvalidWeekStart",
            ErrorCode::InvalidRole => "InvalidRole",
            ErrorCode::InvalidTimezone => "InvalidTimezone",
            ErrorCode::InvalidClient => "InvalidClient",
            ErrorCode::InvalidTask => "InvalidTask",
            ErrorCode::InvalidProject => "InvalidProject",
        }
    }

    /// Default HTTP status for the code. Individual call sites may override,
    /// e.g. the login handler serves every failure as 401.
    fn default_status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::IncorrectPassword
            | ErrorCode::ProfileLocked
            | ErrorCode::ProfileInactive
            | ErrorCode::AccountInactive
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired
            | ErrorCode::MissingToken
            | ErrorCode::NotAuthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Panic
            | ErrorCode::SystemError
            | ErrorCode::EncryptionFailed
            | ErrorCode::TokenCreationFailed
            | ErrorCode::AccountCreateFailed
            | ErrorCode::ProfileCreateFailed => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error carrying a stable code, an HTTP status and optional
/// key/value detail rendered into the error envelope.
#[derive(Debug, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    status: StatusCode,
    detail: BTreeMap<String, Value>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.default_status(),
            code,
            message: message.into(),
            detail: BTreeMap::new(),
            source: None,
        }
    }

    /// Validation failure pointing at a specific request field.
    pub fn field(code: ErrorCode, message: impl Into<String>, field: &str) -> Self {
        Self::new(code, message).with_detail("field", field)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SystemError, message)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.detail.insert(key.to_string(), value.into());
        self
    }

    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Store failures never carry their own wire code; they are all system errors.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::system("Database error").with_source(err)
    }
}

/// Malformed request bodies surface as InvalidJson instead of the framework
/// default rejection body.
impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::new(ErrorCode::InvalidJson, "Invalid JSON").with_source(rejection)
    }
}

/// Error envelope shared by every error response
#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    detail: BTreeMap<String, Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;

        // System errors are logged with full context and served with a
        // generic message; internal detail never crosses the transport layer.
        let (message, error) = if status.is_server_error() {
            tracing::error!(
                code = self.code.as_str(),
                message = %self.message,
                source = self.source.as_deref().map(tracing::field::display),
                "request failed"
            );
            ("Internal server error".to_string(), None)
        } else {
            tracing::warn!(code = self.code.as_str(), message = %self.message, "request rejected");
            (
                self.message,
                self.source.as_deref().map(|source| source.to_string()),
            )
        };

        let body = ErrorBody {
            status: "error",
            error,
            message,
            code: self.code.as_str(),
            detail: self.detail,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
