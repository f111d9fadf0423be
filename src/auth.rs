/// Password hashing, session tokens, cookies and request authentication
use crate::{
    config::SessionConfig,
    context::AppContext,
    db::account::AuthProfile,
    error::{ApiError, ApiResult, ErrorCode},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

const BEARER_PREFIX: &str = "Bearer";
const TOKEN_QUERY_PARAMETER: &str = "token";

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            ApiError::new(
                ErrorCode::EncryptionFailed,
                format!("Password hashing failed: {e}"),
            )
        })?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash. Unparseable hashes (e.g. the
/// placeholder password on invited profiles) never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// URL-safe base64 token from `length` random bytes.
pub fn generate_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn expiration_from_now(minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(minutes)
}

pub fn session_cookie(config: &SessionConfig, token: &str) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookie);

    if !config.cookie_domain.is_empty() {
        builder = builder.domain(config.cookie_domain.clone());
    }

    builder.build()
}

/// Removal cookie for logout.
pub fn expired_session_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), String::new())).path("/");

    if !config.cookie_domain.is_empty() {
        builder = builder.domain(config.cookie_domain.clone());
    }

    builder.build()
}

/// Resolve the session token: bearer header, then the `token` query
/// parameter, then the session cookie. First non-empty value wins.
pub fn token_from_parts(parts: &Parts, cookie_name: &str) -> ApiResult<String> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let value = header
            .to_str()
            .map_err(|_| ApiError::new(ErrorCode::InvalidToken, "Malformed authorization header"))?;

        let mut pieces = value.splitn(2, ' ');
        let scheme = pieces.next().unwrap_or_default();
        let token = pieces
            .next()
            .ok_or_else(|| ApiError::new(ErrorCode::InvalidToken, "Missing authorization token"))?;

        if scheme != BEARER_PREFIX {
            return Err(ApiError::new(
                ErrorCode::InvalidToken,
                format!("Token not Bearer type: {scheme}"),
            ));
        }

        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    if let Some(query) = parts.uri.query() {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                if key == TOKEN_QUERY_PARAMETER && !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
    }

    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            return Ok(cookie.value().to_string());
        }
    }

    Err(ApiError::new(ErrorCode::MissingToken, "Missing token"))
}

/// Authenticated request context: the profile and account resolved from the
/// session token, with status and expiration gates already applied.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub auth: AuthProfile,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts, &ctx.config.session.cookie_name)?;
        let auth = ctx.sessions.authorize(&token).await?;

        Ok(AuthSession { auth, token })
    }
}

/// The resolved token by itself, for endpoints that act on the session row
/// without needing the profile gates (logout).
#[derive(Debug, Clone)]
pub struct RawToken(pub String);

#[async_trait]
impl FromRequestParts<AppContext> for RawToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts, &ctx.config.session.cookie_name)?;
        Ok(RawToken(token))
    }
}

/// Admin-gated request context: requires owner or admin role on the session's
/// account. A capability check on the already-resolved profile, not a
/// re-authentication.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub auth: AuthProfile,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let session = AuthSession::from_request_parts(parts, ctx).await?;

        if !session.auth.role.is_admin() {
            return Err(ApiError::new(ErrorCode::NotAuthorized, "Not permitted")
                .with_status(StatusCode::UNAUTHORIZED));
        }

        Ok(AdminSession {
            auth: session.auth,
            token: session.token,
        })
    }
}

/// Membership and close operations additionally require the account itself to
/// be in an active status.
pub fn require_active_account(auth: &AuthProfile) -> ApiResult<()> {
    if !auth.account.account_status.is_active() {
        return Err(ApiError::new(ErrorCode::AccountInactive, "Account not active")
            .with_detail("status", auth.account.account_status.as_str())
            .with_status(StatusCode::UNAUTHORIZED));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_for(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn placeholder_hash_never_verifies() {
        // Invited profiles store a raw random token in the password column
        let placeholder = generate_token(48);
        assert!(!verify_password(&placeholder, &placeholder));
    }

    #[test]
    fn token_length_and_charset() {
        let token = generate_token(48);
        assert_eq!(token.len(), 64); // 48 bytes -> 64 base64 chars, no padding
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn bearer_header_wins() {
        let parts = parts_for(
            "/api/profile?token=from-query",
            &[
                ("authorization", "Bearer from-header"),
                ("cookie", "tempo_session=from-cookie"),
            ],
        );
        let token = token_from_parts(&parts, "tempo_session").unwrap();
        assert_eq!(token, "from-header");
    }

    #[test]
    fn query_parameter_before_cookie() {
        let parts = parts_for(
            "/api/profile?token=from-query",
            &[("cookie", "tempo_session=from-cookie")],
        );
        let token = token_from_parts(&parts, "tempo_session").unwrap();
        assert_eq!(token, "from-query");
    }

    #[test]
    fn cookie_fallback() {
        let parts = parts_for("/api/profile", &[("cookie", "tempo_session=from-cookie")]);
        let token = token_from_parts(&parts, "tempo_session").unwrap();
        assert_eq!(token, "from-cookie");
    }

    #[test]
    fn missing_token() {
        let parts = parts_for("/api/profile", &[]);
        let err = token_from_parts(&parts, "tempo_session").unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingToken);
    }

    #[test]
    fn non_bearer_scheme_rejected() {
        let parts = parts_for("/api/profile", &[("authorization", "Basic dXNlcg==")]);
        let err = token_from_parts(&parts, "tempo_session").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
    }
}
