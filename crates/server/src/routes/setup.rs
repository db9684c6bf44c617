use axum::{extract::State, http::HeaderMap, Json};
use uuid::Uuid;

use taskboard_api::crypto;
use taskboard_api::db::users;
use taskboard_api::{
    ChangeOp, ChangeTable, Role, SeedResponse, SetupAdminResponse, SETUP_TOKEN_HEADER,
};

use crate::error::ApiErr;
use crate::realtime::ChangeHub;
use crate::routes::auth::hash_password;
use crate::seed;
use crate::storage::{self, Db};
use crate::AppConfig;

const ADMIN_NAME: &str = "Admin User";

/// 403 unless `X-Setup-Token` matches the configured token.
fn check_setup_token(headers: &HeaderMap, config: &AppConfig) -> Result<(), ApiErr> {
    let Some(expected) = config.setup_token.as_deref() else {
        return Err(ApiErr::forbidden("setup endpoints are disabled"));
    };
    let provided = headers
        .get(SETUP_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    // Compare digests so the comparison time does not depend on the token prefix.
    if crypto::hash_token(provided) != crypto::hash_token(expected) {
        return Err(ApiErr::forbidden("invalid setup token"));
    }
    Ok(())
}

/// POST /api/setup/admin: create the default administrator, or promote the
/// existing account with that email.
pub async fn create_admin(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(changes): State<ChangeHub>,
    headers: HeaderMap,
) -> Result<Json<SetupAdminResponse>, ApiErr> {
    check_setup_token(&headers, &config)?;
    let email = config.admin_email.trim().to_lowercase();

    let existing: Option<String> = {
        let conn = db.conn();
        storage::query_optional(&conn, users::get_by_email(&email), |row| row.get(0))
            .map_err(ApiErr::from_db("admin lookup"))?
    };

    if let Some(user_id) = existing {
        {
            let conn = db.conn();
            storage::execute(&conn, users::update_role(&user_id, Role::Admin))
                .map_err(ApiErr::from_db("promote admin"))?;
        }
        tracing::info!(email = %email, "existing account promoted to admin");
        changes.publish(ChangeTable::Users, ChangeOp::Update, &user_id);
        return Ok(Json(SetupAdminResponse {
            success: true,
            message: "Admin user already exists and role updated".into(),
            email,
            user_id,
        }));
    }

    let password = hash_password(config.admin_password.clone()).await?;
    let user_id = Uuid::new_v4().to_string();
    {
        let conn = db.conn();
        storage::execute(
            &conn,
            users::insert(
                &user_id,
                &email,
                ADMIN_NAME,
                &password.hash,
                &password.salt,
                Role::Admin,
            ),
        )
        .map_err(ApiErr::from_db("create admin"))?;
    }

    tracing::info!(email = %email, "admin user created");
    changes.publish(ChangeTable::Users, ChangeOp::Insert, &user_id);
    Ok(Json(SetupAdminResponse {
        success: true,
        message: "Admin user created successfully".into(),
        email,
        user_id,
    }))
}

/// POST /api/setup/seed: load the demonstration data set.
pub async fn seed(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(changes): State<ChangeHub>,
    headers: HeaderMap,
) -> Result<Json<SeedResponse>, ApiErr> {
    check_setup_token(&headers, &config)?;

    let password = hash_password(seed::DEMO_PASSWORD.to_string()).await?;
    let outcome = {
        let conn = db.conn();
        seed::run(&conn, &password).map_err(ApiErr::from_db("seed"))?
    };

    tracing::info!(
        users = outcome.stats.users,
        teams = outcome.stats.teams,
        projects = outcome.stats.projects,
        tasks = outcome.stats.tasks,
        "database seeded"
    );
    for event in &outcome.changes {
        changes.publish(event.table, event.op, &event.id);
    }

    Ok(Json(SeedResponse {
        success: true,
        message: "Database seeded successfully".into(),
        stats: outcome.stats,
    }))
}
