//! Shared API types, crypto, business rules, and SQL builders for taskboard.
//!
//! The server, the client and the CLI all speak in these types. With the
//! `backend` feature the crate also carries what only the server needs:
//! password and token crypto, validation rules, and sea-query builders.
//!
//! `--features ts` exports the wire types as TypeScript into
//! `crates/api/bindings/api-types.generated.ts`
//! (`cargo test -p taskboard-api --features ts -- export_typescript`).

use serde::{Deserialize, Deserializer, Serialize};

#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
#[cfg(feature = "backend")]
pub mod service;

/// Generates `as_str`, `Display` and `FromStr` for a snake_case string enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ServiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($s => Ok(Self::$variant),)+
                    other => Err(ServiceError::BadRequest(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Organisation-wide role of a user. Controls which mutations are allowed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum Role {
    Admin,
    Manager,
    TeamLead,
    #[default]
    Employee,
}

string_enum!(Role {
    Admin => "admin",
    Manager => "manager",
    TeamLead => "team_lead",
    Employee => "employee",
});

/// Board column of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

string_enum!(TaskStatus {
    Todo => "todo",
    InProgress => "in_progress",
    Review => "review",
    Done => "done",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

string_enum!(TaskPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// Table a realtime change notification refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum ChangeTable {
    Users,
    Teams,
    TeamMembers,
    Projects,
    Tasks,
}

string_enum!(ChangeTable {
    Users => "users",
    Teams => "teams",
    TeamMembers => "team_members",
    Projects => "projects",
    Tasks => "tasks",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

string_enum!(ChangeOp {
    Insert => "insert",
    Update => "update",
    Delete => "delete",
});

// ─── Utilities ───────────────────────────────────────────────────────────────

/// Deserialize a present field (including an explicit `null`) as `Some(_)`.
///
/// Combined with `#[serde(default)]` this gives `Option<Option<T>>` three
/// states: absent (leave unchanged), `null` (clear), value (set).
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Email + password registration.
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned on successful login / register / refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request (invalidate refresh token).
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile edit. `avatar_url: null` clears the avatar.
#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<Option<String>>,
}

/// Full user record (never includes credentials).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: String,
}

/// Compact user reference embedded in tasks and search results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserSummary {
    pub id: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// Generic success response for operations that don't return data.
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct OkResponse {
    pub ok: bool,
}

// ─── Teams ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UpdateTeamRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TeamResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub member_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ListTeamsResponse {
    pub teams: Vec<TeamResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TeamDetailResponse {
    #[serde(flatten)]
    pub team: TeamResponse,
    pub members: Vec<MemberResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct AddMemberRequest {
    pub user_id: String,
}

/// One row of `team_members`, joined with the member's profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct MemberResponse {
    pub id: String,
    pub team_id: String,
    pub user_id: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub added_by: Option<String>,
    pub added_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ListMembersResponse {
    pub members: Vec<MemberResponse>,
}

// ─── Projects ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub team_id: Option<String>,
    pub color: String,
    pub deadline: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ListProjectsResponse {
    pub projects: Vec<ProjectResponse>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ProjectListQuery {
    #[serde(default)]
    pub team_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UpdateProjectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub team_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Option<String>>,
}

/// Project page: the project, its task breakdown, and the linked team's members.
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ProjectDetailResponse {
    pub project: ProjectResponse,
    pub stats: TaskStats,
    pub members: Vec<MemberResponse>,
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TaskResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub assignee: Option<UserSummary>,
    pub project_id: String,
    pub due_date: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
}

/// Filters for `GET /api/tasks`. All optional; combined with AND.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TaskListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct CreateTaskRequest {
    pub title: String,
    pub project_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UpdateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<String>>,
}

// ─── Analytics ───────────────────────────────────────────────────────────────

/// Per-status task counts plus the rounded completion percentage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TaskStats {
    pub total: u32,
    pub todo: u32,
    pub in_progress: u32,
    pub review: u32,
    pub done: u32,
    pub completion_rate: u32,
}

impl TaskStats {
    /// Tally a sequence of statuses.
    pub fn from_statuses<I: IntoIterator<Item = TaskStatus>>(statuses: I) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.total += 1;
            match status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Review => stats.review += 1,
                TaskStatus::Done => stats.done += 1,
            }
        }
        if stats.total > 0 {
            stats.completion_rate =
                ((f64::from(stats.done) * 100.0) / f64::from(stats.total)).round() as u32;
        }
        stats
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct DashboardResponse {
    pub projects: i64,
    pub teams: i64,
    pub users: i64,
    /// Breakdown over the most recently created tasks.
    pub recent: TaskStats,
    /// Tasks assigned to the caller that are not done.
    pub my_open_tasks: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SearchResponse {
    pub projects: Vec<ProjectResponse>,
    pub tasks: Vec<TaskResponse>,
    pub users: Vec<UserSummary>,
}

// ─── Realtime ────────────────────────────────────────────────────────────────

/// A row-level change pushed over `GET /api/realtime`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub id: String,
}

/// `tables` is a comma-separated list; absent means every table.
#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct RealtimeQuery {
    #[serde(default)]
    pub tables: Option<String>,
}

/// SSE event name for a [`ChangeEvent`] frame.
pub const SSE_EVENT_CHANGE: &str = "change";
/// SSE event name sent when a subscriber missed notifications.
pub const SSE_EVENT_LAGGED: &str = "lagged";

// ─── Setup ───────────────────────────────────────────────────────────────────

/// Header carrying the setup token for `/api/setup/*`.
pub const SETUP_TOKEN_HEADER: &str = "x-setup-token";

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SetupAdminResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
    pub user_id: String,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SeedStats {
    pub users: u32,
    pub teams: u32,
    pub projects: u32,
    pub tasks: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SeedResponse {
    pub success: bool,
    pub message: String,
    pub stats: SeedStats,
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code. The server converts it into
/// its own response type.
#[derive(Debug)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(" high ".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&Role::TeamLead).unwrap(), "\"team_lead\"");
        assert_eq!(
            serde_json::to_string(&ChangeTable::TeamMembers).unwrap(),
            "\"team_members\""
        );
        let bad: Result<TaskStatus, _> = serde_json::from_str("\"blocked\"");
        assert!(bad.is_err());
    }

    #[test]
    fn task_stats_counts_and_rounds() {
        let stats = TaskStats::from_statuses([
            TaskStatus::Done,
            TaskStatus::Done,
            TaskStatus::Todo,
        ]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.done, 2);
        assert_eq!(stats.todo, 1);
        assert_eq!(stats.completion_rate, 67);

        let empty = TaskStats::from_statuses([]);
        assert_eq!(empty, TaskStats::default());
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let absent: UpdateTaskRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.assignee_id, None);

        let cleared: UpdateTaskRequest = serde_json::from_str(r#"{"assignee_id":null}"#).unwrap();
        assert_eq!(cleared.assignee_id, Some(None));

        let set: UpdateTaskRequest = serde_json::from_str(r#"{"assignee_id":"u1"}"#).unwrap();
        assert_eq!(set.assignee_id, Some(Some("u1".into())));

        let json = serde_json::to_value(&cleared).unwrap();
        assert_eq!(json, serde_json::json!({"assignee_id": null}));
    }

    #[test]
    fn team_detail_flattens_team_fields() {
        let detail = TeamDetailResponse {
            team: TeamResponse {
                id: "t1".into(),
                name: "Design".into(),
                description: None,
                created_by: None,
                created_at: "2025-01-01 00:00:00".into(),
                updated_at: "2025-01-01 00:00:00".into(),
                member_count: 0,
            },
            members: vec![],
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], "t1");
        assert!(json["members"].as_array().unwrap().is_empty());
    }
}
