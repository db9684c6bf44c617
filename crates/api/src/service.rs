//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin: they validate with these helpers, check
//! permissions, and run the SQL from [`crate::db`].

use crate::{crypto, AuthTokenResponse, Role, ServiceError, UserResponse};

// ─── Validation ─────────────────────────────────────────────────────────────

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_COLOR_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 8;
/// Longer inputs add nothing to PBKDF2 strength and invite abuse.
pub const MAX_PASSWORD_LEN: usize = 72;

pub const DEFAULT_PROJECT_COLOR: &str = "hsl(215, 85%, 55%)";

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ServiceError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ServiceError::BadRequest(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Trim `value` and require 1..=`max` characters. `field` names it in the error.
pub fn validate_text(field: &str, value: &str, max: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be 1-{max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_full_name(name: &str) -> Result<String, ServiceError> {
    validate_text("full_name", name, MAX_NAME_LEN)
}

/// Empty or whitespace-only descriptions are stored as NULL.
pub fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

pub fn validate_color(color: Option<&str>) -> Result<String, ServiceError> {
    match color.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PROJECT_COLOR.to_string()),
        Some(c) if c.len() > MAX_COLOR_LEN => Err(ServiceError::BadRequest(format!(
            "color must be at most {MAX_COLOR_LEN} characters"
        ))),
        Some(c) => Ok(c.to_string()),
    }
}

/// Accept `YYYY-MM-DD` or an RFC 3339 timestamp. Returns the trimmed input;
/// empty strings become `None`.
pub fn validate_date(field: &str, value: Option<&str>) -> Result<Option<String>, ServiceError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let is_date = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    let is_timestamp = chrono::DateTime::parse_from_rfc3339(value).is_ok();
    if !is_date && !is_timestamp {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be YYYY-MM-DD or an RFC 3339 timestamp"
        )));
    }
    Ok(Some(value.to_string()))
}

pub const DEFAULT_TASK_LIMIT: u32 = 200;
pub const MAX_TASK_LIMIT: u32 = 500;

pub fn clamp_task_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_TASK_LIMIT).clamp(1, MAX_TASK_LIMIT)
}

/// Build a `LIKE` pattern for a case-insensitive substring search.
/// Returns `None` for blank queries. `%`, `_` and `\` are escaped with `\`.
pub fn search_pattern(query: &str) -> Option<String> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

// ─── Permissions ────────────────────────────────────────────────────────────

/// A guarded action. Reads, task creation and task edits need no permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageUsers,
    ManageTeams,
    ManageTeamMembers,
    ManageProjects,
    DeleteAnyTask,
}

impl Permission {
    fn describe(self) -> &'static str {
        match self {
            Self::ManageUsers => "manage users",
            Self::ManageTeams => "manage teams",
            Self::ManageTeamMembers => "manage team members",
            Self::ManageProjects => "manage projects",
            Self::DeleteAnyTask => "delete other users' tasks",
        }
    }
}

impl Role {
    pub fn allows(self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::Admin => true,
            Role::Manager => matches!(
                permission,
                ManageTeams | ManageTeamMembers | ManageProjects | DeleteAnyTask
            ),
            Role::TeamLead => matches!(permission, ManageTeamMembers | DeleteAnyTask),
            Role::Employee => false,
        }
    }
}

/// `Forbidden` unless `role` allows `permission`.
pub fn require(role: Role, permission: Permission) -> Result<(), ServiceError> {
    if role.allows(permission) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "role '{role}' is not allowed to {}",
            permission.describe()
        )))
    }
}

/// Creators may always delete their own tasks.
pub fn can_delete_task(role: Role, user_id: &str, created_by: Option<&str>) -> bool {
    role.allows(Permission::DeleteAnyTask) || created_by == Some(user_id)
}

// ─── Time ───────────────────────────────────────────────────────────────────

/// Format a unix timestamp the way SQLite's `datetime()` does.
pub fn sqlite_datetime(unix: i64) -> Result<String, ServiceError> {
    chrono::DateTime::from_timestamp(unix, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))
}

pub fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

// ─── Token Bundle ───────────────────────────────────────────────────────────

/// Everything produced when signing a user in. The caller stores
/// `token_hash` under `token_id` and returns `response`.
pub struct TokenBundle {
    pub token_id: String,
    pub token_hash: String,
    /// SQLite datetime of refresh-token expiry.
    pub expires_at: String,
    pub response: AuthTokenResponse,
}

pub fn prepare_token_bundle(
    jwt_secret: &str,
    user: UserResponse,
    now_unix: u64,
) -> Result<TokenBundle, ServiceError> {
    let access_token = crypto::sign_jwt(&user.id, jwt_secret, now_unix);
    let refresh_token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&refresh_token);
    let expires_at = sqlite_datetime((now_unix + crypto::REFRESH_EXPIRY_SECS) as i64)?;

    Ok(TokenBundle {
        token_id: uuid::Uuid::new_v4().to_string(),
        token_hash,
        expires_at,
        response: AuthTokenResponse {
            access_token,
            refresh_token,
            expires_in: crypto::JWT_EXPIRY_SECS,
            user,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(validate_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@").is_err());
    }

    #[test]
    fn password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("user1234").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LEN)).is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LEN + 1)).is_err());
    }

    #[test]
    fn text_is_trimmed_and_bounded() {
        assert_eq!(validate_text("name", "  Design  ", 100).unwrap(), "Design");
        assert!(validate_text("name", "   ", 100).is_err());
        let err = validate_text("title", &"é".repeat(201), MAX_TITLE_LEN).unwrap_err();
        assert_eq!(err.message(), "title must be 1-200 characters");
        assert!(validate_text("title", &"é".repeat(200), MAX_TITLE_LEN).is_ok());
    }

    #[test]
    fn descriptions_and_colors_default() {
        assert_eq!(normalize_description(Some("  ")), None);
        assert_eq!(normalize_description(Some(" x ")), Some("x".into()));
        assert_eq!(validate_color(None).unwrap(), DEFAULT_PROJECT_COLOR);
        assert_eq!(validate_color(Some("hsl(1, 2%, 3%)")).unwrap(), "hsl(1, 2%, 3%)");
        assert!(validate_color(Some(&"x".repeat(65))).is_err());
    }

    #[test]
    fn dates_accept_day_or_timestamp() {
        assert_eq!(
            validate_date("due_date", Some("2025-03-01")).unwrap(),
            Some("2025-03-01".into())
        );
        assert!(validate_date("due_date", Some("2025-03-01T10:00:00Z")).unwrap().is_some());
        assert_eq!(validate_date("due_date", Some("")).unwrap(), None);
        assert!(validate_date("due_date", Some("next tuesday")).is_err());
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern("  "), None);
        assert_eq!(search_pattern("Web").unwrap(), "%web%");
        assert_eq!(search_pattern("50%_off").unwrap(), "%50\\%\\_off%");
    }

    #[test]
    fn task_limit_is_clamped() {
        assert_eq!(clamp_task_limit(None), DEFAULT_TASK_LIMIT);
        assert_eq!(clamp_task_limit(Some(0)), 1);
        assert_eq!(clamp_task_limit(Some(10_000)), MAX_TASK_LIMIT);
    }

    #[test]
    fn role_permission_matrix() {
        use Permission::*;
        let all = [ManageUsers, ManageTeams, ManageTeamMembers, ManageProjects, DeleteAnyTask];
        assert!(all.iter().all(|p| Role::Admin.allows(*p)));
        assert!(all.iter().all(|p| !Role::Employee.allows(*p)));

        assert!(!Role::Manager.allows(ManageUsers));
        assert!(Role::Manager.allows(ManageProjects));
        assert!(Role::Manager.allows(ManageTeams));

        assert!(Role::TeamLead.allows(ManageTeamMembers));
        assert!(!Role::TeamLead.allows(ManageTeams));
        assert!(!Role::TeamLead.allows(ManageProjects));
    }

    #[test]
    fn require_reports_role_and_action() {
        let err = require(Role::Employee, Permission::ManageProjects).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.message(), "role 'employee' is not allowed to manage projects");
    }

    #[test]
    fn task_creator_can_delete_own_task() {
        assert!(can_delete_task(Role::Employee, "u1", Some("u1")));
        assert!(!can_delete_task(Role::Employee, "u1", Some("u2")));
        assert!(!can_delete_task(Role::Employee, "u1", None));
        assert!(can_delete_task(Role::TeamLead, "u1", Some("u2")));
    }

    #[test]
    fn token_bundle_carries_user() {
        let user = UserResponse {
            id: "u1".into(),
            email: "a@b.c".into(),
            full_name: "A".into(),
            avatar_url: None,
            role: Role::Employee,
            created_at: "2025-01-01 00:00:00".into(),
        };
        let bundle = prepare_token_bundle("secret", user, 1_700_000_000).unwrap();
        assert_eq!(bundle.response.user.id, "u1");
        assert_eq!(bundle.token_hash, crypto::hash_token(&bundle.response.refresh_token));
        assert_eq!(
            crypto::verify_jwt(&bundle.response.access_token, "secret", 1_700_000_010).unwrap(),
            "u1"
        );
        assert_eq!(bundle.expires_at, "2023-11-21 22:13:20");
    }
}
