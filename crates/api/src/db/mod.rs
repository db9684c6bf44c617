//! Database schema, migrations, and query builders.
//!
//! Every builder returns a [`Built`] pair of SQL text and bind values; the
//! server executes them against SQLite.

pub mod migrations;
pub mod projects;
pub mod tables;
pub mod tasks;
pub mod teams;
pub mod users;

pub use tables::*;

/// SQL text plus positional bind values.
pub type Built = (String, sea_query::Values);

/// `datetime('now')`, used to stamp `updated_at` on every UPDATE.
pub(crate) fn now_expr() -> sea_query::SimpleExpr {
    sea_query::Expr::cust("datetime('now')")
}
