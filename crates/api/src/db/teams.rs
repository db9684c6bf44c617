//! Team + member query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::tables::{TeamMembers, Teams, Users};
use super::{now_expr, Built};
use crate::UpdateTeamRequest;

// ── Team columns helper ───────────────────────────────────────────────────

/// `id, name, description, created_by, created_at, updated_at, member_count`.
fn team_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((Teams::Table, Teams::Id))
        .column((Teams::Table, Teams::Name))
        .column((Teams::Table, Teams::Description))
        .column((Teams::Table, Teams::CreatedBy))
        .column((Teams::Table, Teams::CreatedAt))
        .column((Teams::Table, Teams::UpdatedAt))
        .expr_as(
            Expr::cust(
                "(SELECT COUNT(*) FROM \"team_members\" \
                 WHERE \"team_members\".\"team_id\" = \"teams\".\"id\")",
            ),
            Alias::new("member_count"),
        )
}

// ── Team queries ──────────────────────────────────────────────────────────

pub fn insert(id: &str, name: &str, description: Option<&str>, created_by: &str) -> Built {
    Query::insert()
        .into_table(Teams::Table)
        .columns([Teams::Id, Teams::Name, Teams::Description, Teams::CreatedBy])
        .values_panic([
            id.into(),
            name.into(),
            description.map(|s| s.to_string()).into(),
            created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    team_columns(&mut q)
        .from(Teams::Table)
        .and_where(Expr::col((Teams::Table, Teams::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Every team, newest first.
pub fn list_all() -> Built {
    let mut q = Query::select().to_owned();
    team_columns(&mut q)
        .from(Teams::Table)
        .order_by((Teams::Table, Teams::CreatedAt), Order::Desc)
        .order_by_expr(Expr::cust("\"teams\".rowid"), Order::Desc)
        .build(SqliteQueryBuilder)
}

pub fn exists(id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Teams::Table)
        .and_where(Expr::col(Teams::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn count() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Teams::Table)
        .build(SqliteQueryBuilder)
}

/// Apply a (validated) patch; absent fields are left untouched.
pub fn update(id: &str, patch: &UpdateTeamRequest) -> Built {
    let mut q = Query::update();
    q.table(Teams::Table).value(Teams::UpdatedAt, now_expr());
    if let Some(name) = &patch.name {
        q.value(Teams::Name, name.as_str());
    }
    if let Some(description) = &patch.description {
        q.value(Teams::Description, description.clone());
    }
    q.and_where(Expr::col(Teams::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Teams::Table)
        .and_where(Expr::col(Teams::Id).eq(id))
        .build(SqliteQueryBuilder)
}

// ── Members ───────────────────────────────────────────────────────────────

/// `id, team_id, user_id, full_name, avatar_url, added_by, added_at`.
fn member_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((TeamMembers::Table, TeamMembers::Id))
        .column((TeamMembers::Table, TeamMembers::TeamId))
        .column((TeamMembers::Table, TeamMembers::UserId))
        .column((Users::Table, Users::FullName))
        .column((Users::Table, Users::AvatarUrl))
        .column((TeamMembers::Table, TeamMembers::AddedBy))
        .column((TeamMembers::Table, TeamMembers::AddedAt))
        .from(TeamMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((TeamMembers::Table, TeamMembers::UserId)),
        )
}

pub fn member_insert(id: &str, team_id: &str, user_id: &str, added_by: &str) -> Built {
    Query::insert()
        .into_table(TeamMembers::Table)
        .columns([
            TeamMembers::Id,
            TeamMembers::TeamId,
            TeamMembers::UserId,
            TeamMembers::AddedBy,
        ])
        .values_panic([id.into(), team_id.into(), user_id.into(), added_by.into()])
        .build(SqliteQueryBuilder)
}

/// Members of a team in the order they were added.
pub fn member_list(team_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    member_columns(&mut q)
        .and_where(Expr::col((TeamMembers::Table, TeamMembers::TeamId)).eq(team_id))
        .order_by((TeamMembers::Table, TeamMembers::AddedAt), Order::Asc)
        .order_by_expr(Expr::cust("\"team_members\".rowid"), Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn member_get(member_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    member_columns(&mut q)
        .and_where(Expr::col((TeamMembers::Table, TeamMembers::Id)).eq(member_id))
        .build(SqliteQueryBuilder)
}

pub fn member_exists(team_id: &str, user_id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(TeamMembers::Table)
        .and_where(Expr::col(TeamMembers::TeamId).eq(team_id))
        .and_where(Expr::col(TeamMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Membership row ids for a team or a user, removed when either is deleted.
pub fn member_ids(team_id: Option<&str>, user_id: Option<&str>) -> Built {
    let mut q = Query::select()
        .column(TeamMembers::Id)
        .from(TeamMembers::Table)
        .to_owned();
    if let Some(team_id) = team_id {
        q.and_where(Expr::col(TeamMembers::TeamId).eq(team_id));
    }
    if let Some(user_id) = user_id {
        q.and_where(Expr::col(TeamMembers::UserId).eq(user_id));
    }
    q.build(SqliteQueryBuilder)
}

/// Delete a membership row, scoped to its team.
pub fn member_delete(team_id: &str, member_id: &str) -> Built {
    Query::delete()
        .from_table(TeamMembers::Table)
        .and_where(Expr::col(TeamMembers::Id).eq(member_id))
        .and_where(Expr::col(TeamMembers::TeamId).eq(team_id))
        .build(SqliteQueryBuilder)
}
