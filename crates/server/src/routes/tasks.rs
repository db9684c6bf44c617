use axum::{extract::State, http::StatusCode, Json};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::db::{tasks, users};
use taskboard_api::service;
use taskboard_api::{
    ChangeOp, ChangeTable, CreateTaskRequest, ListTasksResponse, TaskListQuery, TaskResponse,
    UpdateTaskRequest,
};

use crate::error::{ApiErr, ApiJson, ApiPath, ApiQuery};
use crate::realtime::ChangeHub;
use crate::routes::auth::AuthUser;
use crate::routes::projects::project_exists;
use crate::storage::{self, task_from_row, Db};

fn load_task(conn: &Connection, id: &str) -> Result<TaskResponse, ApiErr> {
    storage::query_optional(conn, tasks::get_by_id(id), task_from_row)
        .map_err(ApiErr::from_db("load task"))?
        .ok_or_else(|| ApiErr::not_found("task not found"))
}

fn require_project(conn: &Connection, project_id: &str) -> Result<(), ApiErr> {
    if project_exists(conn, project_id)? {
        Ok(())
    } else {
        Err(ApiErr::not_found("project not found"))
    }
}

fn require_assignee(conn: &Connection, user_id: &str) -> Result<(), ApiErr> {
    let exists: bool = storage::query_scalar(conn, users::exists(user_id))
        .map_err(ApiErr::from_db("assignee exists"))?;
    if exists {
        Ok(())
    } else {
        Err(ApiErr::not_found("assignee not found"))
    }
}

fn normalize_id(id: Option<&str>) -> Option<String> {
    id.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

// ---------------------------------------------------------------------------
// List / create
// ---------------------------------------------------------------------------

/// GET /api/tasks?project_id=&status=&assignee_id=&limit=: newest first.
pub async fn list_tasks(
    State(db): State<Db>,
    _user: AuthUser,
    ApiQuery(q): ApiQuery<TaskListQuery>,
) -> Result<Json<ListTasksResponse>, ApiErr> {
    let project_id = normalize_id(q.project_id.as_deref());
    let assignee_id = normalize_id(q.assignee_id.as_deref());
    let filter = tasks::TaskFilter {
        project_id: project_id.as_deref(),
        status: q.status,
        assignee_id: assignee_id.as_deref(),
        limit: u64::from(service::clamp_task_limit(q.limit)),
    };

    let conn = db.conn();
    let tasks = storage::query_all(&conn, tasks::list(&filter), task_from_row)
        .map_err(ApiErr::from_db("list tasks"))?;
    Ok(Json(ListTasksResponse { tasks }))
}

/// POST /api/tasks: any signed-in user; the caller becomes `created_by`.
pub async fn create_task(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiErr> {
    let title = service::validate_text("title", &req.title, service::MAX_TITLE_LEN)?;
    let description = service::normalize_description(req.description.as_deref());
    let due_date = service::validate_date("due_date", req.due_date.as_deref())?;
    let assignee_id = normalize_id(req.assignee_id.as_deref());
    let project_id = req.project_id.trim();

    let id = Uuid::new_v4().to_string();
    let task = {
        let conn = db.conn();
        require_project(&conn, project_id)?;
        if let Some(assignee_id) = &assignee_id {
            require_assignee(&conn, assignee_id)?;
        }
        storage::execute(
            &conn,
            tasks::insert(&tasks::NewTask {
                id: &id,
                title: &title,
                description: description.as_deref(),
                status: req.status.unwrap_or_default(),
                priority: req.priority.unwrap_or_default(),
                assignee_id: assignee_id.as_deref(),
                project_id,
                due_date: due_date.as_deref(),
                created_by: user.id(),
            }),
        )
        .map_err(ApiErr::from_db("create task"))?;
        load_task(&conn, &id)?
    };

    changes.publish(ChangeTable::Tasks, ChangeOp::Insert, &id);
    Ok((StatusCode::CREATED, Json(task)))
}

// ---------------------------------------------------------------------------
// Detail / update / delete
// ---------------------------------------------------------------------------

/// GET /api/tasks/:id
pub async fn get_task(
    State(db): State<Db>,
    _user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(load_task(&conn, &id)?))
}

/// PUT /api/tasks/:id: partial update. Moving across board columns is a
/// status change; `null` clears assignee, description or due date.
pub async fn update_task(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    _user: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let patch = UpdateTaskRequest {
        title: req
            .title
            .as_deref()
            .map(|t| service::validate_text("title", t, service::MAX_TITLE_LEN))
            .transpose()?,
        description: req
            .description
            .map(|d| service::normalize_description(d.as_deref())),
        status: req.status,
        priority: req.priority,
        assignee_id: req.assignee_id.map(|a| normalize_id(a.as_deref())),
        project_id: req.project_id.map(|p| p.trim().to_string()),
        due_date: req
            .due_date
            .map(|d| service::validate_date("due_date", d.as_deref()))
            .transpose()?,
    };

    let task = {
        let conn = db.conn();
        if let Some(project_id) = &patch.project_id {
            require_project(&conn, project_id)?;
        }
        if let Some(Some(assignee_id)) = &patch.assignee_id {
            require_assignee(&conn, assignee_id)?;
        }
        let changed = storage::execute(&conn, tasks::update(&id, &patch))
            .map_err(ApiErr::from_db("update task"))?;
        if changed == 0 {
            return Err(ApiErr::not_found("task not found"));
        }
        load_task(&conn, &id)?
    };

    changes.publish(ChangeTable::Tasks, ChangeOp::Update, &id);
    Ok(Json(task))
}

/// DELETE /api/tasks/:id: the creator, or team lead and up.
pub async fn delete_task(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiErr> {
    {
        let conn = db.conn();
        let created_by: Option<String> =
            storage::query_optional(&conn, tasks::get_creator(&id), |row| row.get(0))
                .map_err(ApiErr::from_db("task creator"))?
                .ok_or_else(|| ApiErr::not_found("task not found"))?;

        if !service::can_delete_task(user.role(), user.id(), created_by.as_deref()) {
            return Err(ApiErr::forbidden(
                "only the task's creator or a team lead and above can delete it",
            ));
        }

        storage::execute(&conn, tasks::delete(&id)).map_err(ApiErr::from_db("delete task"))?;
    }

    changes.publish(ChangeTable::Tasks, ChangeOp::Delete, &id);
    Ok(StatusCode::NO_CONTENT)
}
