use axum::{extract::State, http::StatusCode, Json};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::db::{projects, teams, users};
use taskboard_api::service::{self, Permission};
use taskboard_api::{
    AddMemberRequest, ChangeOp, ChangeTable, CreateTeamRequest, ListMembersResponse,
    ListTeamsResponse, MemberResponse, TeamDetailResponse, TeamResponse, UpdateTeamRequest,
};

use crate::error::{ApiErr, ApiJson, ApiPath};
use crate::realtime::ChangeHub;
use crate::routes::auth::AuthUser;
use crate::storage::{self, is_constraint_violation, member_from_row, team_from_row, Db};

fn load_team(conn: &Connection, id: &str) -> Result<TeamResponse, ApiErr> {
    storage::query_optional(conn, teams::get_by_id(id), team_from_row)
        .map_err(ApiErr::from_db("load team"))?
        .ok_or_else(|| ApiErr::not_found("team not found"))
}

pub(crate) fn load_members(conn: &Connection, team_id: &str) -> Result<Vec<MemberResponse>, ApiErr> {
    storage::query_all(conn, teams::member_list(team_id), member_from_row)
        .map_err(ApiErr::from_db("list members"))
}

fn team_exists(conn: &Connection, id: &str) -> Result<bool, ApiErr> {
    storage::query_scalar(conn, teams::exists(id)).map_err(ApiErr::from_db("team exists"))
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// GET /api/teams: every team, newest first, with member counts.
pub async fn list_teams(
    State(db): State<Db>,
    _user: AuthUser,
) -> Result<Json<ListTeamsResponse>, ApiErr> {
    let conn = db.conn();
    let teams = storage::query_all(&conn, teams::list_all(), team_from_row)
        .map_err(ApiErr::from_db("list teams"))?;
    Ok(Json(ListTeamsResponse { teams }))
}

/// POST /api/teams: create a team (admin / manager).
pub async fn create_team(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    user.require(Permission::ManageTeams)?;
    let name = service::validate_text("name", &req.name, service::MAX_NAME_LEN)?;
    let description = service::normalize_description(req.description.as_deref());

    let id = Uuid::new_v4().to_string();
    let team = {
        let conn = db.conn();
        storage::execute(
            &conn,
            teams::insert(&id, &name, description.as_deref(), user.id()),
        )
        .map_err(ApiErr::from_db("create team"))?;
        load_team(&conn, &id)?
    };

    changes.publish(ChangeTable::Teams, ChangeOp::Insert, &id);
    Ok((StatusCode::CREATED, Json(team)))
}

/// GET /api/teams/:id: team detail with its members.
pub async fn get_team(
    State(db): State<Db>,
    _user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<TeamDetailResponse>, ApiErr> {
    let conn = db.conn();
    let team = load_team(&conn, &id)?;
    let members = load_members(&conn, &id)?;
    Ok(Json(TeamDetailResponse { team, members }))
}

/// PUT /api/teams/:id: rename / re-describe a team (admin / manager).
pub async fn update_team(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateTeamRequest>,
) -> Result<Json<TeamResponse>, ApiErr> {
    user.require(Permission::ManageTeams)?;
    let patch = UpdateTeamRequest {
        name: req
            .name
            .as_deref()
            .map(|n| service::validate_text("name", n, service::MAX_NAME_LEN))
            .transpose()?,
        description: req
            .description
            .map(|d| service::normalize_description(d.as_deref())),
    };

    let team = {
        let conn = db.conn();
        let changed = storage::execute(&conn, teams::update(&id, &patch))
            .map_err(ApiErr::from_db("update team"))?;
        if changed == 0 {
            return Err(ApiErr::not_found("team not found"));
        }
        load_team(&conn, &id)?
    };

    changes.publish(ChangeTable::Teams, ChangeOp::Update, &id);
    Ok(Json(team))
}

/// DELETE /api/teams/:id: members are removed, linked projects detached.
pub async fn delete_team(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiErr> {
    user.require(Permission::ManageTeams)?;

    let (detached, members): (Vec<String>, Vec<String>) = {
        let conn = db.conn();
        let detached = storage::query_all(&conn, projects::ids_for_team(&id), |row| row.get(0))
            .map_err(ApiErr::from_db("team projects"))?;
        let members = storage::query_all(&conn, teams::member_ids(Some(&id), None), |row| {
            row.get(0)
        })
        .map_err(ApiErr::from_db("team members"))?;
        let deleted = storage::execute(&conn, teams::delete(&id))
            .map_err(ApiErr::from_db("delete team"))?;
        if deleted == 0 {
            return Err(ApiErr::not_found("team not found"));
        }
        (detached, members)
    };

    tracing::info!(by = user.id(), team = %id, "team deleted");
    changes.publish(ChangeTable::Teams, ChangeOp::Delete, &id);
    for member_id in &members {
        changes.publish(ChangeTable::TeamMembers, ChangeOp::Delete, member_id);
    }
    for project_id in &detached {
        changes.publish(ChangeTable::Projects, ChangeOp::Update, project_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// GET /api/teams/:id/members
pub async fn list_members(
    State(db): State<Db>,
    _user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<ListMembersResponse>, ApiErr> {
    let conn = db.conn();
    if !team_exists(&conn, &id)? {
        return Err(ApiErr::not_found("team not found"));
    }
    let members = load_members(&conn, &id)?;
    Ok(Json(ListMembersResponse { members }))
}

/// POST /api/teams/:id/members: add a user to a team (team lead and up).
pub async fn add_member(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath(team_id): ApiPath<String>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiErr> {
    user.require(Permission::ManageTeamMembers)?;
    let already_member = || ApiErr::conflict("user is already a member of this team");

    let member_id = Uuid::new_v4().to_string();
    let member = {
        let conn = db.conn();
        if !team_exists(&conn, &team_id)? {
            return Err(ApiErr::not_found("team not found"));
        }
        let user_exists: bool = storage::query_scalar(&conn, users::exists(&req.user_id))
            .map_err(ApiErr::from_db("member user exists"))?;
        if !user_exists {
            return Err(ApiErr::not_found("user not found"));
        }
        let is_member: bool =
            storage::query_scalar(&conn, teams::member_exists(&team_id, &req.user_id))
                .map_err(ApiErr::from_db("member exists"))?;
        if is_member {
            return Err(already_member());
        }

        storage::execute(
            &conn,
            teams::member_insert(&member_id, &team_id, &req.user_id, user.id()),
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                already_member()
            } else {
                ApiErr::from_db("add member")(e)
            }
        })?;

        storage::query_optional(&conn, teams::member_get(&member_id), member_from_row)
            .map_err(ApiErr::from_db("load member"))?
            .ok_or_else(|| ApiErr::internal("member vanished after insert"))?
    };

    changes.publish(ChangeTable::TeamMembers, ChangeOp::Insert, &member_id);
    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /api/teams/:id/members/:member_id: remove a membership row.
pub async fn remove_member(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiPath((team_id, member_id)): ApiPath<(String, String)>,
) -> Result<StatusCode, ApiErr> {
    user.require(Permission::ManageTeamMembers)?;

    {
        let conn = db.conn();
        let deleted = storage::execute(&conn, teams::member_delete(&team_id, &member_id))
            .map_err(ApiErr::from_db("remove member"))?;
        if deleted == 0 {
            return Err(ApiErr::not_found("member not found"));
        }
    }

    changes.publish(ChangeTable::TeamMembers, ChangeOp::Delete, &member_id);
    Ok(StatusCode::NO_CONTENT)
}
