//! User / auth query builders.

use sea_query::{Asterisk, Expr, Func, LikeExpr, Order, Query, SqliteQueryBuilder};

use super::tables::{RefreshTokens, Users};
use super::{now_expr, Built};
use crate::{Role, UpdateProfileRequest};

/// Column order shared by every query that yields a full user row:
/// `id, email, full_name, avatar_url, role, created_at`.
fn user_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.columns([
        Users::Id,
        Users::Email,
        Users::FullName,
        Users::AvatarUrl,
        Users::Role,
        Users::CreatedAt,
    ])
}

// ── User lookups ───────────────────────────────────────────────────────────

pub fn get_by_id(user_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    user_columns(&mut q)
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn get_by_email(email: &str) -> Built {
    let mut q = Query::select().to_owned();
    user_columns(&mut q)
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Credentials for login: `id, password_hash, password_salt`.
pub fn get_credentials_by_email(email: &str) -> Built {
    Query::select()
        .columns([Users::Id, Users::PasswordHash, Users::PasswordSalt])
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// `password_hash, password_salt` for a user.
pub fn get_password_fields(user_id: &str) -> Built {
    Query::select()
        .columns([Users::PasswordHash, Users::PasswordSalt])
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// All users, alphabetical by name.
pub fn list_all() -> Built {
    let mut q = Query::select().to_owned();
    user_columns(&mut q)
        .from(Users::Table)
        .order_by(Users::FullName, Order::Asc)
        .order_by(Users::Email, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn exists(user_id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn count() -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Users::Table)
        .build(SqliteQueryBuilder)
}

/// Name search: `id, full_name, avatar_url`.
pub fn search(pattern: &str, limit: u64) -> Built {
    Query::select()
        .columns([Users::Id, Users::FullName, Users::AvatarUrl])
        .from(Users::Table)
        .and_where(
            Expr::expr(Func::lower(Expr::col(Users::FullName)))
                .like(LikeExpr::new(pattern).escape('\\')),
        )
        .order_by(Users::FullName, Order::Asc)
        .limit(limit)
        .build(SqliteQueryBuilder)
}

// ── User mutations ─────────────────────────────────────────────────────────

pub fn insert(
    id: &str,
    email: &str,
    full_name: &str,
    password_hash: &str,
    password_salt: &str,
    role: Role,
) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::Email,
            Users::FullName,
            Users::PasswordHash,
            Users::PasswordSalt,
            Users::Role,
        ])
        .values_panic([
            id.into(),
            email.into(),
            full_name.into(),
            password_hash.into(),
            password_salt.into(),
            role.as_str().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn update_role(user_id: &str, role: Role) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::Role, role.as_str())
        .value(Users::UpdatedAt, now_expr())
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Apply a (validated) profile patch. Absent fields are left untouched.
pub fn update_profile(user_id: &str, patch: &UpdateProfileRequest) -> Built {
    let mut q = Query::update();
    q.table(Users::Table).value(Users::UpdatedAt, now_expr());
    if let Some(name) = &patch.full_name {
        q.value(Users::FullName, name.as_str());
    }
    if let Some(avatar) = &patch.avatar_url {
        q.value(Users::AvatarUrl, avatar.clone());
    }
    q.and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn update_password(user_id: &str, password_hash: &str, password_salt: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::PasswordHash, password_hash)
        .value(Users::PasswordSalt, password_salt)
        .value(Users::UpdatedAt, now_expr())
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn delete(user_id: &str) -> Built {
    Query::delete()
        .from_table(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

// ── Refresh tokens ─────────────────────────────────────────────────────────

pub fn insert_refresh_token(id: &str, user_id: &str, token_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(RefreshTokens::Table)
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::TokenHash,
            RefreshTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            token_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// `id, user_id, expires_at` of a refresh token.
pub fn lookup_refresh_token(token_hash: &str) -> Built {
    Query::select()
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::ExpiresAt,
        ])
        .from(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Delete a refresh token, scoped to its owner.
pub fn delete_refresh_token(token_hash: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .and_where(Expr::col(RefreshTokens::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn delete_refresh_token_by_id(id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete_refresh_tokens_for_user(user_id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}
