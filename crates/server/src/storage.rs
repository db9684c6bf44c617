use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{types::Value as SqlValue, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use taskboard_api::db::{migrations::MIGRATIONS, Built};
use taskboard_api::{
    MemberResponse, ProjectResponse, TaskResponse, TeamResponse, UserResponse, UserSummary,
};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("taskboard.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    register_functions(&conn).context("registering SQL functions")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

/// Replace `lower()` with Unicode case folding so it agrees with the
/// `str::to_lowercase` used for search patterns. SQLite's own only folds ASCII.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query execution
// ---------------------------------------------------------------------------

/// Convert `sea_query::Values` into rusqlite bind params.
pub fn bind_values(values: &sea_query::Values) -> Vec<SqlValue> {
    values
        .0
        .iter()
        .map(|v| match v {
            sea_query::Value::String(Some(s)) => SqlValue::Text(s.as_str().to_owned()),
            sea_query::Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
            sea_query::Value::Int(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::BigInt(Some(i)) => SqlValue::Integer(*i),
            sea_query::Value::Unsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
            sea_query::Value::BigUnsigned(Some(u)) => {
                SqlValue::Integer(i64::try_from(*u).unwrap_or(i64::MAX))
            }
            sea_query::Value::Double(Some(f)) => SqlValue::Real(*f),
            _ => SqlValue::Null,
        })
        .collect()
}

/// Run an INSERT/UPDATE/DELETE; returns the number of affected rows.
pub fn execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, rusqlite::params_from_iter(bind_values(&values)))
}

/// First row mapped through `f`, or `None` when the query returns nothing.
pub fn query_optional<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Option<T>> {
    conn.query_row(&sql, rusqlite::params_from_iter(bind_values(&values)), f)
        .optional()
}

/// Every row mapped through `f`.
pub fn query_all<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bind_values(&values)), f)?;
    rows.collect()
}

/// Single-value query such as `COUNT(*)` or an existence check.
pub fn query_scalar<T: rusqlite::types::FromSql>(
    conn: &Connection,
    (sql, values): Built,
) -> rusqlite::Result<T> {
    conn.query_row(&sql, rusqlite::params_from_iter(bind_values(&values)), |row| {
        row.get(0)
    })
}

/// True for UNIQUE / PRIMARY KEY / FOREIGN KEY violations.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Row mappers (column order matches the builders in `taskboard_api::db`)
// ---------------------------------------------------------------------------

/// Read a text column and parse it into one of the string enums.
pub fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// `id, email, full_name, avatar_url, role, created_at`
pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserResponse> {
    Ok(UserResponse {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        role: parse_col(row, 4)?,
        created_at: row.get(5)?,
    })
}

/// `id, full_name, avatar_url`
pub fn user_summary_from_row(row: &Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(0)?,
        full_name: row.get(1)?,
        avatar_url: row.get(2)?,
    })
}

/// `id, name, description, created_by, created_at, updated_at, member_count`
pub fn team_from_row(row: &Row<'_>) -> rusqlite::Result<TeamResponse> {
    Ok(TeamResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        member_count: row.get(6)?,
    })
}

/// `id, team_id, user_id, full_name, avatar_url, added_by, added_at`
pub fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberResponse> {
    Ok(MemberResponse {
        id: row.get(0)?,
        team_id: row.get(1)?,
        user_id: row.get(2)?,
        full_name: row.get(3)?,
        avatar_url: row.get(4)?,
        added_by: row.get(5)?,
        added_at: row.get(6)?,
    })
}

/// `id, name, description, team_id, color, deadline, created_by, created_at, updated_at`
pub fn project_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectResponse> {
    Ok(ProjectResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        team_id: row.get(3)?,
        color: row.get(4)?,
        deadline: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// `id, title, description, status, priority, assignee_id, assignee_name,
/// assignee_avatar, project_id, due_date, created_by, created_at, updated_at`
pub fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskResponse> {
    let assignee_id: Option<String> = row.get(5)?;
    let assignee_name: Option<String> = row.get(6)?;
    let assignee = match (&assignee_id, assignee_name) {
        (Some(id), Some(full_name)) => Some(UserSummary {
            id: id.clone(),
            full_name,
            avatar_url: row.get(7)?,
        }),
        _ => None,
    };
    Ok(TaskResponse {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_col(row, 3)?,
        priority: parse_col(row, 4)?,
        assignee_id,
        assignee,
        project_id: row.get(8)?,
        due_date: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_api::db::{projects, tasks, teams, users};
    use taskboard_api::{Role, TaskPriority, TaskStatus};

    fn open() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        init_db(dir.path()).unwrap();
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn builders_round_trip_through_sqlite() {
        let (_dir, db) = open();
        let conn = db.conn();
        execute(
            &conn,
            users::insert("u1", "ada@example.com", "Ada", "h", "s", Role::Manager),
        )
        .unwrap();
        execute(&conn, teams::insert("t1", "Core", None, "u1")).unwrap();
        execute(&conn, teams::member_insert("m1", "t1", "u1", "u1")).unwrap();
        execute(
            &conn,
            projects::insert(&projects::NewProject {
                id: "p1",
                name: "Launch",
                description: None,
                team_id: Some("t1"),
                color: "red",
                deadline: None,
                created_by: "u1",
            }),
        )
        .unwrap();
        execute(
            &conn,
            tasks::insert(&tasks::NewTask {
                id: "k1",
                title: "Ship it",
                description: None,
                status: TaskStatus::Review,
                priority: TaskPriority::High,
                assignee_id: Some("u1"),
                project_id: "p1",
                due_date: Some("2030-01-01"),
                created_by: "u1",
            }),
        )
        .unwrap();

        let user = query_optional(&conn, users::get_by_id("u1"), user_from_row)
            .unwrap()
            .unwrap();
        assert_eq!(user.role, Role::Manager);

        let team = query_optional(&conn, teams::get_by_id("t1"), team_from_row)
            .unwrap()
            .unwrap();
        assert_eq!(team.member_count, 1);

        let task = query_optional(&conn, tasks::get_by_id("k1"), task_from_row)
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Review);
        assert_eq!(task.assignee.unwrap().full_name, "Ada");

        let found: Vec<_> = query_all(&conn, projects::search("%laun%", 5), project_from_row)
            .unwrap();
        assert_eq!(found.len(), 1);

        let exists: bool = query_scalar(&conn, teams::member_exists("t1", "u1")).unwrap();
        assert!(exists);
    }

    #[test]
    fn duplicate_membership_is_a_constraint_violation() {
        let (_dir, db) = open();
        let conn = db.conn();
        execute(&conn, users::insert("u1", "a@b.c", "A", "h", "s", Role::Employee)).unwrap();
        execute(&conn, teams::insert("t1", "Core", None, "u1")).unwrap();
        execute(&conn, teams::member_insert("m1", "t1", "u1", "u1")).unwrap();
        let err = execute(&conn, teams::member_insert("m2", "t1", "u1", "u1")).unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn deleting_assignee_keeps_task_unassigned() {
        let (_dir, db) = open();
        let conn = db.conn();
        execute(&conn, users::insert("u1", "a@b.c", "A", "h", "s", Role::Employee)).unwrap();
        execute(&conn, users::insert("u2", "b@b.c", "B", "h", "s", Role::Employee)).unwrap();
        execute(
            &conn,
            projects::insert(&projects::NewProject {
                id: "p1",
                name: "P",
                description: None,
                team_id: None,
                color: "red",
                deadline: None,
                created_by: "u1",
            }),
        )
        .unwrap();
        execute(
            &conn,
            tasks::insert(&tasks::NewTask {
                id: "k1",
                title: "T",
                description: None,
                status: TaskStatus::Todo,
                priority: TaskPriority::Low,
                assignee_id: Some("u2"),
                project_id: "p1",
                due_date: None,
                created_by: "u1",
            }),
        )
        .unwrap();

        execute(&conn, users::delete("u2")).unwrap();
        let task = query_optional(&conn, tasks::get_by_id("k1"), task_from_row)
            .unwrap()
            .unwrap();
        assert_eq!(task.assignee_id, None);
        assert!(task.assignee.is_none());
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let (_dir, db) = open();
        let conn = db.conn();
        execute(
            &conn,
            users::insert("u1", "elodie@example.com", "Élodie Martin", "h", "s", Role::Employee),
        )
        .unwrap();
        execute(
            &conn,
            projects::insert(&projects::NewProject {
                id: "p1",
                name: "ÜBERSICHT Relaunch",
                description: None,
                team_id: None,
                color: "red",
                deadline: None,
                created_by: "u1",
            }),
        )
        .unwrap();

        for query in ["Élodie", "ÉLODIE", "élodie"] {
            let pattern = taskboard_api::service::search_pattern(query).unwrap();
            let hits = query_all(&conn, users::search(&pattern, 5), user_summary_from_row).unwrap();
            assert_eq!(hits.len(), 1, "query {query:?}");
        }

        let pattern = taskboard_api::service::search_pattern("übersicht").unwrap();
        let hits = query_all(&conn, projects::search(&pattern, 5), project_from_row).unwrap();
        assert_eq!(hits.len(), 1);

        let nulls: Option<String> = conn.query_row("SELECT lower(NULL)", [], |r| r.get(0)).unwrap();
        assert_eq!(nulls, None);
    }
}
