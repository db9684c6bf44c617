//! Task query builders.

use sea_query::{
    Alias, Asterisk, Cond, Expr, Func, LikeExpr, Order, Query, SelectStatement, SqliteQueryBuilder,
};

use super::tables::{Tasks, Users};
use super::{now_expr, Built};
use crate::{TaskPriority, TaskStatus, UpdateTaskRequest};

/// A validated task ready for INSERT.
pub struct NewTask<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<&'a str>,
    pub project_id: &'a str,
    pub due_date: Option<&'a str>,
    pub created_by: &'a str,
}

/// Normalized list filters.
#[derive(Debug, Default)]
pub struct TaskFilter<'a> {
    pub project_id: Option<&'a str>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<&'a str>,
    pub limit: u64,
}

/// `id, title, description, status, priority, assignee_id, assignee_name,
/// assignee_avatar, project_id, due_date, created_by, created_at, updated_at`.
fn task_select() -> SelectStatement {
    Query::select()
        .column((Tasks::Table, Tasks::Id))
        .column((Tasks::Table, Tasks::Title))
        .column((Tasks::Table, Tasks::Description))
        .column((Tasks::Table, Tasks::Status))
        .column((Tasks::Table, Tasks::Priority))
        .column((Tasks::Table, Tasks::AssigneeId))
        .expr_as(
            Expr::col((Users::Table, Users::FullName)),
            Alias::new("assignee_name"),
        )
        .expr_as(
            Expr::col((Users::Table, Users::AvatarUrl)),
            Alias::new("assignee_avatar"),
        )
        .column((Tasks::Table, Tasks::ProjectId))
        .column((Tasks::Table, Tasks::DueDate))
        .column((Tasks::Table, Tasks::CreatedBy))
        .column((Tasks::Table, Tasks::CreatedAt))
        .column((Tasks::Table, Tasks::UpdatedAt))
        .from(Tasks::Table)
        .left_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Tasks::Table, Tasks::AssigneeId)),
        )
        .to_owned()
}

fn newest_first(q: &mut SelectStatement) -> &mut SelectStatement {
    q.order_by((Tasks::Table, Tasks::CreatedAt), Order::Desc)
        .order_by_expr(Expr::cust("\"tasks\".rowid"), Order::Desc)
}

pub fn insert(task: &NewTask<'_>) -> Built {
    Query::insert()
        .into_table(Tasks::Table)
        .columns([
            Tasks::Id,
            Tasks::Title,
            Tasks::Description,
            Tasks::Status,
            Tasks::Priority,
            Tasks::AssigneeId,
            Tasks::ProjectId,
            Tasks::DueDate,
            Tasks::CreatedBy,
        ])
        .values_panic([
            task.id.into(),
            task.title.into(),
            task.description.map(str::to_string).into(),
            task.status.as_str().into(),
            task.priority.as_str().into(),
            task.assignee_id.map(str::to_string).into(),
            task.project_id.into(),
            task.due_date.map(str::to_string).into(),
            task.created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    task_select()
        .and_where(Expr::col((Tasks::Table, Tasks::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list(filter: &TaskFilter<'_>) -> Built {
    let mut q = task_select();
    if let Some(project_id) = filter.project_id {
        q.and_where(Expr::col((Tasks::Table, Tasks::ProjectId)).eq(project_id));
    }
    if let Some(status) = filter.status {
        q.and_where(Expr::col((Tasks::Table, Tasks::Status)).eq(status.as_str()));
    }
    if let Some(assignee_id) = filter.assignee_id {
        q.and_where(Expr::col((Tasks::Table, Tasks::AssigneeId)).eq(assignee_id));
    }
    newest_first(&mut q)
        .limit(filter.limit)
        .build(SqliteQueryBuilder)
}

/// `created_by` of a task (for the delete-own-task rule).
pub fn get_creator(id: &str) -> Built {
    Query::select()
        .column(Tasks::CreatedBy)
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Ids of every task in a project (removed along with it).
pub fn ids_for_project(project_id: &str) -> Built {
    Query::select()
        .column(Tasks::Id)
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::ProjectId).eq(project_id))
        .build(SqliteQueryBuilder)
}

/// Ids of the tasks assigned to a user (unassigned when the user goes).
pub fn ids_assigned_to(user_id: &str) -> Built {
    Query::select()
        .column(Tasks::Id)
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::AssigneeId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Statuses of every task in a project.
pub fn statuses_for_project(project_id: &str) -> Built {
    Query::select()
        .column(Tasks::Status)
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::ProjectId).eq(project_id))
        .build(SqliteQueryBuilder)
}

/// Statuses of the `limit` most recently created tasks.
pub fn recent_statuses(limit: u64) -> Built {
    Query::select()
        .column(Tasks::Status)
        .from(Tasks::Table)
        .order_by(Tasks::CreatedAt, Order::Desc)
        .order_by_expr(Expr::cust("rowid"), Order::Desc)
        .limit(limit)
        .build(SqliteQueryBuilder)
}

/// Number of not-done tasks assigned to a user.
pub fn count_open_assigned(user_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::AssigneeId).eq(user_id))
        .and_where(Expr::col(Tasks::Status).ne(TaskStatus::Done.as_str()))
        .build(SqliteQueryBuilder)
}

/// Title/description search, newest first.
pub fn search(pattern: &str, limit: u64) -> Built {
    let mut q = task_select();
    q.cond_where(
        Cond::any()
            .add(
                Expr::expr(Func::lower(Expr::col((Tasks::Table, Tasks::Title))))
                    .like(LikeExpr::new(pattern).escape('\\')),
            )
            .add(
                Expr::expr(Func::lower(Expr::col((Tasks::Table, Tasks::Description))))
                    .like(LikeExpr::new(pattern).escape('\\')),
            ),
    );
    newest_first(&mut q).limit(limit).build(SqliteQueryBuilder)
}

/// Apply a (validated) patch; absent fields are left untouched.
pub fn update(id: &str, patch: &UpdateTaskRequest) -> Built {
    let mut q = Query::update();
    q.table(Tasks::Table).value(Tasks::UpdatedAt, now_expr());
    if let Some(title) = &patch.title {
        q.value(Tasks::Title, title.as_str());
    }
    if let Some(description) = &patch.description {
        q.value(Tasks::Description, description.clone());
    }
    if let Some(status) = patch.status {
        q.value(Tasks::Status, status.as_str());
    }
    if let Some(priority) = patch.priority {
        q.value(Tasks::Priority, priority.as_str());
    }
    if let Some(assignee_id) = &patch.assignee_id {
        q.value(Tasks::AssigneeId, assignee_id.clone());
    }
    if let Some(project_id) = &patch.project_id {
        q.value(Tasks::ProjectId, project_id.as_str());
    }
    if let Some(due_date) = &patch.due_date {
        q.value(Tasks::DueDate, due_date.clone());
    }
    q.and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Tasks::Table)
        .and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_joins_assignee_and_applies_filters() {
        let filter = TaskFilter {
            project_id: Some("p1"),
            status: Some(TaskStatus::Review),
            assignee_id: None,
            limit: 50,
        };
        let (sql, values) = list(&filter);
        assert!(sql.contains("LEFT JOIN \"users\""));
        assert!(sql.contains("\"tasks\".\"project_id\" = ?"));
        assert!(sql.contains("\"tasks\".\"status\" = ?"));
        assert!(!sql.contains("\"tasks\".\"assignee_id\" = ?"));
        // project, status, limit
        assert_eq!(values.0.len(), 3);
    }

    #[test]
    fn patch_moves_column_without_touching_title() {
        let patch = UpdateTaskRequest {
            status: Some(TaskStatus::Done),
            ..Default::default()
        };
        let (sql, _) = update("t1", &patch);
        assert!(sql.contains("\"status\" = ?"));
        assert!(!sql.contains("\"title\""));
    }
}
