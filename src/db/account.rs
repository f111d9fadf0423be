/// Row models and status enums for tenants, people and sessions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recorded against failed logins arriving without a resolvable peer address
pub const MISSING_IP_ADDRESS: &str = "0.0.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    New,
    Valid,
    Archived,
    Suspended,
}

impl AccountStatus {
    /// An account can act while new or valid; archived and suspended cannot.
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::New | AccountStatus::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::New => "new",
            AccountStatus::Valid => "valid",
            AccountStatus::Archived => "archived",
            AccountStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProfileStatus {
    New,
    NotVerified,
    Valid,
}

impl ProfileStatus {
    /// A profile may authenticate while new or valid; invited users must
    /// finish setup first.
    pub fn is_active(&self) -> bool {
        matches!(self, ProfileStatus::New | ProfileStatus::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::New => "new",
            ProfileStatus::NotVerified => "not-verified",
            ProfileStatus::Valid => "valid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProfileAccountStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Reporting,
    User,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Parses a request-supplied role name; unknown names return None and
    /// callers fall back to the default member role.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "reporting" => Some(Role::Reporting),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Reporting => "reporting",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub account_id: i64,
    pub company: String,
    pub account_status: AccountStatus,
    pub week_start: i64,
    pub account_timezone: String,
    pub close_reason: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub profile_id: i64,
    pub email: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub profile_status: ProfileStatus,
    pub timezone: String,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub token_expiration: Option<DateTime<Utc>>,
    pub session_type: String,
}

/// A profile resolved together with one account membership: the most
/// recently used one at login, or the session's account during a request.
#[derive(Debug, Clone)]
pub struct AuthProfile {
    pub profile: Profile,
    pub account: Account,
    pub role: Role,
    pub profile_account_status: ProfileAccountStatus,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ForgotPassword {
    pub profile_id: i64,
    pub forgot_password_expiration: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_statuses() {
        assert!(AccountStatus::New.is_active());
        assert!(AccountStatus::Valid.is_active());
        assert!(!AccountStatus::Archived.is_active());
        assert!(!AccountStatus::Suspended.is_active());

        assert!(ProfileStatus::New.is_active());
        assert!(ProfileStatus::Valid.is_active());
        assert!(!ProfileStatus::NotVerified.is_active());
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("owner"), Some(Role::Owner));
        assert_eq!(Role::parse("reporting"), Some(Role::Reporting));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn admin_roles() {
        assert!(Role::Owner.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Reporting.is_admin());
        assert!(!Role::User.is_admin());
    }
}
