use axum::{extract::State, Json};

use taskboard_api::db::{projects, tasks, teams, users};
use taskboard_api::service;
use taskboard_api::{DashboardResponse, SearchQuery, SearchResponse, TaskStats, TaskStatus};

use crate::error::{ApiErr, ApiQuery};
use crate::routes::auth::AuthUser;
use crate::storage::{self, project_from_row, task_from_row, user_summary_from_row, Db};

/// Tasks considered for the dashboard's status breakdown.
const RECENT_TASKS: u64 = 50;
/// Hits returned per entity kind by global search.
const SEARCH_LIMIT: u64 = 5;

/// GET /api/dashboard: entity counts, recent task breakdown, caller's open tasks.
pub async fn dashboard(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiErr> {
    let conn = db.conn();
    let count = |built, what: &str| -> Result<i64, ApiErr> {
        storage::query_scalar(&conn, built).map_err(ApiErr::from_db(what))
    };

    let projects = count(projects::count(), "count projects")?;
    let teams = count(teams::count(), "count teams")?;
    let users = count(users::count(), "count users")?;
    let my_open_tasks = count(tasks::count_open_assigned(user.id()), "count open tasks")?;

    let statuses: Vec<TaskStatus> =
        storage::query_all(&conn, tasks::recent_statuses(RECENT_TASKS), |row| {
            storage::parse_col(row, 0)
        })
        .map_err(ApiErr::from_db("recent task statuses"))?;

    Ok(Json(DashboardResponse {
        projects,
        teams,
        users,
        recent: TaskStats::from_statuses(statuses),
        my_open_tasks,
    }))
}

/// GET /api/search?q=: case-insensitive substring match over projects,
/// tasks and people. A blank query returns nothing.
pub async fn search(
    State(db): State<Db>,
    _user: AuthUser,
    ApiQuery(q): ApiQuery<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiErr> {
    let Some(pattern) = service::search_pattern(&q.q) else {
        return Ok(Json(SearchResponse::default()));
    };

    let conn = db.conn();
    let projects = storage::query_all(&conn, projects::search(&pattern, SEARCH_LIMIT), project_from_row)
        .map_err(ApiErr::from_db("search projects"))?;
    let tasks = storage::query_all(&conn, tasks::search(&pattern, SEARCH_LIMIT), task_from_row)
        .map_err(ApiErr::from_db("search tasks"))?;
    let users = storage::query_all(&conn, users::search(&pattern, SEARCH_LIMIT), user_summary_from_row)
        .map_err(ApiErr::from_db("search users"))?;

    Ok(Json(SearchResponse {
        projects,
        tasks,
        users,
    }))
}
