use axum::{extract::State, http::StatusCode, Json};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::db::{projects, tasks, teams};
use taskboard_api::service::{self, Permission};
use taskboard_api::{
    ChangeOp, ChangeTable, CreateProjectRequest, ListProjectsResponse, ProjectDetailResponse,
    ProjectListQuery, ProjectResponse, TaskStats, TaskStatus, UpdateProjectRequest,
};

use crate::error::{ApiErr, ApiJson, ApiPath, ApiQuery};
use crate::realtime::ChangeHub;
use crate::routes::auth::AuthUser;
use crate::routes::teams::load_members;
use crate::storage::{self, project_from_row, Db};

fn load_project(conn: &Connection, id: &str) -> Result<ProjectResponse, ApiErr> {
    storage::query_optional(conn, projects::get_by_id(id), project_from_row)
        .map_err(ApiErr::from_db("load project"))?
        .ok_or_else(|| ApiErr::not_found("project not found"))
}

pub(crate) fn project_exists(conn: &Connection, id: &str) -> Result<bool, ApiErr> {
    storage::query_scalar(conn, projects::exists(id)).map_err(ApiErr::from_db("project exists"))
}

fn require_team(conn: &Connection, team_id: &str) -> Result<(), ApiErr> {
    let exists: bool =
        storage::query_scalar(conn, teams::exists(team_id)).map_err(ApiErr::from_db("team exists"))?;
    if exists {
        Ok(())
    } else {
        Err(ApiErr::not_found("team not found"))
    }
}

fn project_stats_for(conn: &Connection, id: &str) -> Result<TaskStats, ApiErr> {
    let statuses: Vec<TaskStatus> =
        storage::query_all(conn, tasks::statuses_for_project(id), |row| {
            storage::parse_col(row, 0)
        })
        .map_err(ApiErr::from_db("project task statuses"))?;
    Ok(TaskStats::from_statuses(statuses))
}

/// Empty team ids are treated as "no team".
fn normalize_team_id(team_id: Option<&str>) -> Option<String> {
    team_id
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// List / create
// ---------------------------------------------------------------------------

/// GET /api/projects?team_id=: newest first.
pub async fn list_projects(
    State(db): State<Db>,
    _user: AuthUser,
    ApiQuery(q): ApiQuery<ProjectListQuery>,
) -> Result<Json<ListProjectsResponse>, ApiErr> {
    let team_id = normalize_team_id(q.team_id.as_deref());
    let conn = db.conn();
    let projects = storage::query_all(&conn, projects::list(team_id.as_deref()), project_from_row)
        .map_err(ApiErr::from_db("list projects"))?;
    Ok(Json(ListProjectsResponse { projects }))
}

/// POST /api/projects: admin / manager.
pub async fn create_project(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiErr> {
    user.require(Permission::ManageProjects)?;
    let name = service::validate_text("name", &req.name, service::MAX_NAME_LEN)?;
    let description = service::normalize_description(req.description.as_deref());
    let color = service::validate_color(req.color.as_deref())?;
    let deadline = service::validate_date("deadline", req.deadline.as_deref())?;
    let team_id = normalize_team_id(req.team_id.as_deref());

    let id = Uuid::new_v4().to_string();
    let project = {
        let conn = db.conn();
        if let Some(team_id) = &team_id {
            require_team(&conn, team_id)?;
        }
        storage::execute(
            &conn,
            projects::insert(&projects::NewProject {
                id: &id,
                name: &name,
                description: description.as_deref(),
                team_id: team_id.as_deref(),
                color: &color,
                deadline: deadline.as_deref(),
                created_by: user.id(),
            }),
        )
        .map_err(ApiErr::from_db("create project"))?;
        load_project(&conn, &id)?
    };

    changes.publish(ChangeTable::Projects, ChangeOp::Insert, &id);
    Ok((StatusCode::CREATED, Json(project)))
}

// ---------------------------------------------------------------------------
// Detail / stats
// ---------------------------------------------------------------------------

/// GET /api/projects/:id: project, task breakdown, and linked team members.
pub async fn get_project(
    State(db): State<Db>,
    _user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<ProjectDetailResponse>, ApiErr> {
    let conn = db.conn();
    let project = load_project(&conn, &id)?;
    let stats = project_stats_for(&conn, &id)?;
    let members = match &project.team_id {
        Some(team_id) => load_members(&conn, team_id)?,
        None => Vec::new(),
    };
    Ok(Json(ProjectDetailResponse {
        project,
        stats,
        members,
    }))
}

/// GET /api/projects/:id/stats
pub async fn project_stats(
    State(db): State<Db>,
    _user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<TaskStats>, ApiErr> {
    let conn = db.conn();
    if !project_exists(&conn, &id)? {
        return Err(ApiErr::not_found("project not found"));
    }
    Ok(Json(project_stats_for(&conn, &id)?))
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

/// PUT /api/projects/:id: partial update; `null` clears nullable fields.
pub async fn update_project(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiErr> {
    user.require(Permission::ManageProjects)?;
    let patch = UpdateProjectRequest {
        name: req
            .name
            .as_deref()
            .map(|n| service::validate_text("name", n, service::MAX_NAME_LEN))
            .transpose()?,
        description: req
            .description
            .map(|d| service::normalize_description(d.as_deref())),
        team_id: req.team_id.map(|t| normalize_team_id(t.as_deref())),
        color: req
            .color
            .as_deref()
            .map(|c| service::validate_color(Some(c)))
            .transpose()?,
        deadline: req
            .deadline
            .map(|d| service::validate_date("deadline", d.as_deref()))
            .transpose()?,
    };

    let project = {
        let conn = db.conn();
        if let Some(Some(team_id)) = &patch.team_id {
            require_team(&conn, team_id)?;
        }
        let changed = storage::execute(&conn, projects::update(&id, &patch))
            .map_err(ApiErr::from_db("update project"))?;
        if changed == 0 {
            return Err(ApiErr::not_found("project not found"));
        }
        load_project(&conn, &id)?
    };

    changes.publish(ChangeTable::Projects, ChangeOp::Update, &id);
    Ok(Json(project))
}

/// DELETE /api/projects/:id: the project's tasks go with it.
pub async fn delete_project(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiErr> {
    user.require(Permission::ManageProjects)?;

    let removed_tasks: Vec<String> = {
        let conn = db.conn();
        let task_ids = storage::query_all(&conn, tasks::ids_for_project(&id), |row| row.get(0))
            .map_err(ApiErr::from_db("project tasks"))?;
        let deleted = storage::execute(&conn, projects::delete(&id))
            .map_err(ApiErr::from_db("delete project"))?;
        if deleted == 0 {
            return Err(ApiErr::not_found("project not found"));
        }
        task_ids
    };

    tracing::info!(by = user.id(), project = %id, tasks = removed_tasks.len(), "project deleted");
    changes.publish(ChangeTable::Projects, ChangeOp::Delete, &id);
    for task_id in &removed_tasks {
        changes.publish(ChangeTable::Tasks, ChangeOp::Delete, task_id);
    }
    Ok(StatusCode::NO_CONTENT)
}
