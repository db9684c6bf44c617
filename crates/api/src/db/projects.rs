//! Project query builders.

use sea_query::{Asterisk, Cond, Expr, Func, LikeExpr, Order, Query, SqliteQueryBuilder};

use super::tables::Projects;
use super::{now_expr, Built};
use crate::UpdateProjectRequest;

/// A validated project ready for INSERT.
pub struct NewProject<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub team_id: Option<&'a str>,
    pub color: &'a str,
    pub deadline: Option<&'a str>,
    pub created_by: &'a str,
}

/// `id, name, description, team_id, color, deadline, created_by, created_at, updated_at`.
const COLUMNS: [Projects; 9] = [
    Projects::Id,
    Projects::Name,
    Projects::Description,
    Projects::TeamId,
    Projects::Color,
    Projects::Deadline,
    Projects::CreatedBy,
    Projects::CreatedAt,
    Projects::UpdatedAt,
];

pub fn insert(project: &NewProject<'_>) -> Built {
    Query::insert()
        .into_table(Projects::Table)
        .columns([
            Projects::Id,
            Projects::Name,
            Projects::Description,
            Projects::TeamId,
            Projects::Color,
            Projects::Deadline,
            Projects::CreatedBy,
        ])
        .values_panic([
            project.id.into(),
            project.name.into(),
            project.description.map(str::to_string).into(),
            project.team_id.map(str::to_string).into(),
            project.color.into(),
            project.deadline.map(str::to_string).into(),
            project.created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .columns(COLUMNS)
        .from(Projects::Table)
        .and_where(Expr::col(Projects::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Projects newest first, optionally restricted to one team.
pub fn list(team_id: Option<&str>) -> Built {
    let mut q = Query::select();
    q.columns(COLUMNS).from(Projects::Table);
    if let Some(team_id) = team_id {
        q.and_where(Expr::col(Projects::TeamId).eq(team_id));
    }
    q.order_by(Projects::CreatedAt, Order::Desc)
        .order_by_expr(Expr::cust("rowid"), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Ids of the projects linked to a team (detached when the team is deleted).
pub fn ids_for_team(team_id: &str) -> Built {
    Query::select()
        .column(Projects::Id)
        .from(Projects::Table)
        .and_where(Expr::col(Projects::TeamId).eq(team_id))
        .build(SqliteQueryBuilder)
}

pub fn exists(id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Projects::Table)
        .and_where(Expr::col(Projects::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn count() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Projects::Table)
        .build(SqliteQueryBuilder)
}

/// Name/description search, newest first.
pub fn search(pattern: &str, limit: u64) -> Built {
    Query::select()
        .columns(COLUMNS)
        .from(Projects::Table)
        .cond_where(
            Cond::any()
                .add(
                    Expr::expr(Func::lower(Expr::col(Projects::Name)))
                        .like(LikeExpr::new(pattern).escape('\\')),
                )
                .add(
                    Expr::expr(Func::lower(Expr::col(Projects::Description)))
                        .like(LikeExpr::new(pattern).escape('\\')),
                ),
        )
        .order_by(Projects::CreatedAt, Order::Desc)
        .limit(limit)
        .build(SqliteQueryBuilder)
}

/// Apply a (validated) patch; absent fields are left untouched.
pub fn update(id: &str, patch: &UpdateProjectRequest) -> Built {
    let mut q = Query::update();
    q.table(Projects::Table).value(Projects::UpdatedAt, now_expr());
    if let Some(name) = &patch.name {
        q.value(Projects::Name, name.as_str());
    }
    if let Some(description) = &patch.description {
        q.value(Projects::Description, description.clone());
    }
    if let Some(team_id) = &patch.team_id {
        q.value(Projects::TeamId, team_id.clone());
    }
    if let Some(color) = &patch.color {
        q.value(Projects::Color, color.as_str());
    }
    if let Some(deadline) = &patch.deadline {
        q.value(Projects::Deadline, deadline.clone());
    }
    q.and_where(Expr::col(Projects::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Projects::Table)
        .and_where(Expr::col(Projects::Id).eq(id))
        .build(SqliteQueryBuilder)
}
