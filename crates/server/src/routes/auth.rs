use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::crypto::{self, PasswordHash};
use taskboard_api::db::users;
use taskboard_api::service::{self, Permission};
use taskboard_api::{
    AuthTokenResponse, ChangeOp, ChangePasswordRequest, ChangeTable, LoginRequest, LogoutRequest,
    OkResponse, RefreshRequest, RegisterRequest, Role, UpdateProfileRequest, UserResponse,
};

use crate::error::{ApiErr, ApiJson};
use crate::realtime::ChangeHub;
use crate::routes::users::apply_profile_patch;
use crate::storage::{self, is_constraint_violation, user_from_row, Db};
use crate::AppConfig;

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Caller authenticated by `Authorization: Bearer <jwt>`.
///
/// The user row is re-read on every request so role changes and deletions
/// take effect immediately.
pub struct AuthUser {
    pub user: UserResponse,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    /// 403 unless the caller's role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), ApiErr> {
        Ok(service::require(self.user.role, permission)?)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiErr::unauthorized("missing or invalid Authorization header"))?;

        let config = AppConfig::from_ref(state);
        let user_id = crypto::verify_jwt(token, &config.jwt_secret, service::now_unix())?;

        let db = Db::from_ref(state);
        let conn = db.conn();
        let user = storage::query_optional(&conn, users::get_by_id(&user_id), user_from_row)
            .map_err(ApiErr::from_db("auth user lookup"))?
            .ok_or_else(|| ApiErr::unauthorized("user no longer exists"))?;

        Ok(AuthUser { user })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// PBKDF2 off the async workers.
pub(crate) async fn hash_password(password: String) -> Result<PasswordHash, ApiErr> {
    tokio::task::spawn_blocking(move || crypto::hash_password(&password))
        .await
        .map_err(ApiErr::from_db("password hash task"))?
        .map_err(ApiErr::from)
}

async fn verify_password(password: String, hash: String, salt: String) -> Result<bool, ApiErr> {
    tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash, &salt))
        .await
        .map_err(ApiErr::from_db("password verify task"))
}

/// Sign an access token and persist a fresh refresh token for `user_id`.
fn issue_tokens(
    conn: &Connection,
    jwt_secret: &str,
    user_id: &str,
) -> Result<AuthTokenResponse, ApiErr> {
    let user = storage::query_optional(conn, users::get_by_id(user_id), user_from_row)
        .map_err(ApiErr::from_db("load user for token"))?
        .ok_or_else(|| ApiErr::unauthorized("user no longer exists"))?;

    let bundle = service::prepare_token_bundle(jwt_secret, user, service::now_unix())?;
    storage::execute(
        conn,
        users::insert_refresh_token(
            &bundle.token_id,
            user_id,
            &bundle.token_hash,
            &bundle.expires_at,
        ),
    )
    .map_err(ApiErr::from_db("store refresh token"))?;

    Ok(bundle.response)
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

/// POST /api/auth/register: create an `employee` account and sign it in.
pub async fn register(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(changes): State<ChangeHub>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthTokenResponse>), ApiErr> {
    if !config.registration_open {
        return Err(ApiErr::forbidden("registration is currently closed"));
    }

    let email = service::validate_email(&req.email)?;
    service::validate_password(&req.password)?;
    let full_name = service::validate_full_name(&req.full_name)?;
    let password = hash_password(req.password).await?;

    let user_id = Uuid::new_v4().to_string();
    let tokens = {
        let conn = db.conn();
        storage::execute(
            &conn,
            users::insert(
                &user_id,
                &email,
                &full_name,
                &password.hash,
                &password.salt,
                Role::Employee,
            ),
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ApiErr::conflict("email already registered")
            } else {
                ApiErr::from_db("register")(e)
            }
        })?;
        issue_tokens(&conn, &config.jwt_secret, &user_id)?
    };

    tracing::info!(user_id = %user_id, "user registered");
    changes.publish(ChangeTable::Users, ChangeOp::Insert, &user_id);
    Ok((StatusCode::CREATED, Json(tokens)))
}

// ---------------------------------------------------------------------------
// Login / refresh / logout
// ---------------------------------------------------------------------------

/// POST /api/auth/login: email + password.
pub async fn login(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let invalid = || ApiErr::unauthorized("invalid email or password");
    let email = req.email.trim().to_lowercase();

    let found: Option<(String, String, String)> = {
        let conn = db.conn();
        storage::query_optional(&conn, users::get_credentials_by_email(&email), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(ApiErr::from_db("login lookup"))?
    };
    let Some((user_id, hash, salt)) = found else {
        verify_password(
            req.password,
            crypto::DECOY_HASH_HEX.into(),
            crypto::DECOY_SALT_HEX.into(),
        )
        .await?;
        return Err(invalid());
    };

    if !verify_password(req.password, hash, salt).await? {
        return Err(invalid());
    }

    let conn = db.conn();
    Ok(Json(issue_tokens(&conn, &config.jwt_secret, &user_id)?))
}

/// POST /api/auth/refresh: rotate a refresh token.
pub async fn refresh(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);
    let now = service::sqlite_datetime(service::now_unix() as i64)?;

    let conn = db.conn();
    let (token_id, user_id, expires_at): (String, String, String) =
        storage::query_optional(&conn, users::lookup_refresh_token(&token_hash), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(ApiErr::from_db("refresh lookup"))?
        .ok_or_else(|| ApiErr::unauthorized("invalid refresh token"))?;

    storage::execute(&conn, users::delete_refresh_token_by_id(&token_id))
        .map_err(ApiErr::from_db("delete used refresh token"))?;

    if expires_at < now {
        return Err(ApiErr::unauthorized("refresh token expired"));
    }

    Ok(Json(issue_tokens(&conn, &config.jwt_secret, &user_id)?))
}

/// POST /api/auth/logout: revoke one of the caller's refresh tokens.
pub async fn logout(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<LogoutRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);
    let conn = db.conn();
    storage::execute(&conn, users::delete_refresh_token(&token_hash, user.id()))
        .map_err(ApiErr::from_db("logout"))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Current user
// ---------------------------------------------------------------------------

/// GET /api/auth/me
pub async fn me(user: AuthUser) -> Json<UserResponse> {
    Json(user.user)
}

/// PUT /api/auth/password: change password and revoke every refresh token.
pub async fn change_password(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    service::validate_password(&req.new_password)?;

    let (hash, salt): (String, String) = {
        let conn = db.conn();
        storage::query_optional(&conn, users::get_password_fields(user.id()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(ApiErr::from_db("password lookup"))?
        .ok_or_else(|| ApiErr::unauthorized("user no longer exists"))?
    };

    if !verify_password(req.current_password, hash, salt).await? {
        return Err(ApiErr::unauthorized("current password is incorrect"));
    }

    let password = hash_password(req.new_password).await?;

    let conn = db.conn();
    storage::execute(
        &conn,
        users::update_password(user.id(), &password.hash, &password.salt),
    )
    .map_err(ApiErr::from_db("update password"))?;
    storage::execute(&conn, users::delete_refresh_tokens_for_user(user.id()))
        .map_err(ApiErr::from_db("revoke refresh tokens"))?;

    tracing::info!(user_id = user.id(), "password changed");
    Ok(Json(OkResponse { ok: true }))
}

/// PUT /api/auth/profile: edit the caller's own profile.
pub async fn update_profile(
    State(db): State<Db>,
    State(changes): State<ChangeHub>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiErr> {
    let updated = apply_profile_patch(&db, user.id(), req)?;
    changes.publish(ChangeTable::Users, ChangeOp::Update, &updated.id);
    Ok(Json(updated))
}
