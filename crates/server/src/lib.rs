//! Taskboard HTTP server: Axum routes over a single SQLite connection.

pub mod error;
pub mod realtime;
pub mod routes;
pub mod seed;
pub mod storage;

use axum::{
    extract::FromRef,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use realtime::ChangeHub;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub changes: ChangeHub,
}

impl AppState {
    pub fn new(db: Db, config: AppConfig) -> Self {
        Self {
            db,
            config,
            changes: ChangeHub::default(),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub jwt_secret: String,
    /// `TASKBOARD_REGISTRATION=closed` disables self-service sign-up.
    pub registration_open: bool,
    /// Required in `X-Setup-Token` for `/api/setup/*`; unset disables them.
    pub setup_token: Option<String>,
    pub admin_email: String,
    pub admin_password: String,
}

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@gmail.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin1234";

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = env_non_empty("BASE_URL").unwrap_or_else(|| "http://localhost:3000".into());

        let jwt_secret = match env_non_empty("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "JWT_SECRET not set; using a random secret, sessions end when the server restarts"
                );
                taskboard_api::crypto::generate_token()?
            }
        };

        let registration_open = std::env::var("TASKBOARD_REGISTRATION")
            .map(|v| v.trim() != "closed")
            .unwrap_or(true);

        let setup_token = env_non_empty("SETUP_TOKEN");
        if setup_token.is_none() {
            tracing::info!("SETUP_TOKEN not set; setup endpoints are disabled");
        }

        Ok(Self {
            base_url,
            jwt_secret,
            registration_open,
            setup_token,
            admin_email: env_non_empty("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.into()),
            admin_password: env_non_empty("ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.into()),
        })
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ChangeHub {
    fn from_ref(state: &AppState) -> Self {
        state.changes.clone()
    }
}

/// All `/api` routes plus the optional static web bundle.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/password", put(routes::auth::change_password))
        .route("/auth/profile", put(routes::auth::update_profile))
        // Users
        .route("/users", get(routes::users::list_users))
        .route("/users/{id}", delete(routes::users::delete_user))
        .route("/users/{id}/role", put(routes::users::update_role))
        .route("/users/{id}/profile", put(routes::users::update_profile))
        // Teams
        .route(
            "/teams",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/teams/{id}",
            get(routes::teams::get_team)
                .put(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route(
            "/teams/{id}/members",
            get(routes::teams::list_members).post(routes::teams::add_member),
        )
        .route(
            "/teams/{id}/members/{member_id}",
            delete(routes::teams::remove_member),
        )
        // Projects
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/{id}",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route("/projects/{id}/stats", get(routes::projects::project_stats))
        // Tasks
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/{id}",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        // Dashboard & search
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route("/search", get(routes::dashboard::search))
        // Realtime
        .route("/realtime", get(realtime::stream))
        // Setup
        .route("/setup/admin", post(routes::setup::create_admin))
        .route("/setup/seed", post(routes::setup::seed));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
