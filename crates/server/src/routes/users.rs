use axum::{extract::State, http::StatusCode, Json};

use taskboard_api::db::{tasks, teams, users};
use taskboard_api::service::{self, Permission};
use taskboard_api::{
    ChangeOp, ChangeTable, ListUsersResponse, UpdateProfileRequest, UpdateRoleRequest,
    UserResponse,
};

use crate::error::{ApiErr, ApiJson, ApiPath};
use crate::realtime::ChangeHub;
use crate::routes::auth::AuthUser;
use crate::storage::{self, user_from_row, Db};

/// Validate a profile patch, apply it, and return the updated row.
pub(crate) fn apply_profile_patch(
    db: &Db,
    user_id: &str,
    req: UpdateProfileRequest,
) -> Result<UserResponse, ApiErr> {
    let patch = UpdateProfileRequest {
        full_name: req
            .full_name
            .as_deref()
            .map(service::validate_full_name)
            .transpose()?,
        avatar_url: req
            .avatar_url
            .map(|url| url.as_deref().map(str::trim).filter(|u| !u.is_empty()).map(str::to_string)),
    };

    let conn = db.conn();
    let changed = storage::execute(&conn, users::update_profile(user_id, &patch))
        .map_err(ApiErr::from_db("update profile"))?;
    if changed == 0 {
        return Err(ApiErr::not_found("user not found"));
    }
    load_user(&conn, user_id)
}

fn load_user(conn: &rusqlite::Connection, user_id: &str) -> Result<UserResponse, ApiErr> {
    storage::query_optional(conn, users::get_by_id(user_id), user_from_row)
        .map_err(ApiErr::from_db("load user"))?
        .ok_or_else(|| ApiErr::not_found("user not found"))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/users: every user with their role, by name.
pub async fn list_users(
    State(db): State<Db>,
    _user: AuthUser,
) -> Result<Json<ListUsersResponse>, ApiErr> {
    let conn = db.conn();
    let users = storage::query_all(&conn, users::list_all(), user_from_row)
        .map_err(ApiErr::from_db("list users"))?;
    Ok(Json(ListUsersResponse { users }))
}

// ---------------------------------------------------------------------------
// Admin operations
// ---------------------------------------------------------------------------

/// PUT /api/users/:id/role: admin only; admins cannot change their own role.
pub async fn update_role(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, ApiErr> {
    user.require(Permission::ManageUsers)?;
    if id == user.id() {
        return Err(ApiErr::conflict("you cannot change your own role"));
    }

    let updated = {
        let conn = db.conn();
        let changed = storage::execute(&conn, users::update_role(&id, req.role))
            .map_err(ApiErr::from_db("update role"))?;
        if changed == 0 {
            return Err(ApiErr::not_found("user not found"));
        }
        load_user(&conn, &id)?
    };

    tracing::info!(by = user.id(), user_id = %id, role = %req.role, "role changed");
    changes.publish(ChangeTable::Users, ChangeOp::Update, &id);
    Ok(Json(updated))
}

/// PUT /api/users/:id/profile: own profile, or anyone's with ManageUsers.
pub async fn update_profile(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiErr> {
    if id != user.id() {
        user.require(Permission::ManageUsers)?;
    }
    let updated = apply_profile_patch(&db, &id, req)?;
    changes.publish(ChangeTable::Users, ChangeOp::Update, &id);
    Ok(Json(updated))
}

/// DELETE /api/users/:id: admin only. Memberships and tokens cascade,
/// assigned tasks become unassigned.
pub async fn delete_user(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiErr> {
    user.require(Permission::ManageUsers)?;
    if id == user.id() {
        return Err(ApiErr::conflict("you cannot delete your own account"));
    }

    let (unassigned, memberships): (Vec<String>, Vec<String>) = {
        let conn = db.conn();
        let unassigned = storage::query_all(&conn, tasks::ids_assigned_to(&id), |row| row.get(0))
            .map_err(ApiErr::from_db("assigned tasks"))?;
        let memberships = storage::query_all(&conn, teams::member_ids(None, Some(&id)), |row| {
            row.get(0)
        })
        .map_err(ApiErr::from_db("user memberships"))?;
        let deleted = storage::execute(&conn, users::delete(&id))
            .map_err(ApiErr::from_db("delete user"))?;
        if deleted == 0 {
            return Err(ApiErr::not_found("user not found"));
        }
        (unassigned, memberships)
    };

    tracing::info!(by = user.id(), user_id = %id, "user deleted");
    changes.publish(ChangeTable::Users, ChangeOp::Delete, &id);
    for member_id in &memberships {
        changes.publish(ChangeTable::TeamMembers, ChangeOp::Delete, member_id);
    }
    for task_id in &unassigned {
        changes.publish(ChangeTable::Tasks, ChangeOp::Update, task_id);
    }
    Ok(StatusCode::NO_CONTENT)
}
