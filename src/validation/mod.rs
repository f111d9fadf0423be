/// Pure request-field predicates shared by the API handlers
use regex::Regex;
use std::sync::LazyLock;

pub const EMAIL_MIN_LENGTH: usize = 5;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 64;
pub const NAME_MIN_LENGTH: usize = 1;
pub const NAME_MAX_LENGTH: usize = 64;
pub const COMPANY_NAME_MIN_LENGTH: usize = 1;
pub const COMPANY_NAME_MAX_LENGTH: usize = 64;
pub const CLIENT_NAME_MIN_LENGTH: usize = 1;
pub const CLIENT_NAME_MAX_LENGTH: usize = 64;
pub const PROJECT_NAME_MIN_LENGTH: usize = 1;
pub const PROJECT_NAME_MAX_LENGTH: usize = 128;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$";

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern must compile"));

pub fn is_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// Length bounds measured in characters, not bytes.
pub fn is_length(value: &str, min: usize, max: usize) -> bool {
    let length = value.chars().count();
    length >= min && length <= max
}

/// IANA zone names all carry an area/location separator.
pub fn is_timezone(zone: &str) -> bool {
    !zone.is_empty() && zone.contains('/')
}

/// Week start is a weekday index, 0 = Sunday through 6 = Saturday.
pub fn is_week_start(week_start: i64) -> bool {
    (0..7).contains(&week_start)
}
