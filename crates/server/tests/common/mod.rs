//! In-process server for integration tests: real router, real SQLite in a
//! temp dir, driven through `taskboard-api-client`.

#![allow(dead_code)]

use std::time::Duration;

use taskboard_api::crypto;
use taskboard_api::db::users;
use taskboard_api::service;
use taskboard_api::Role;
use taskboard_api_client::ApiClient;
use taskboard_server::realtime::ChangeHub;
use taskboard_server::storage;
use taskboard_server::{build_router, AppConfig, AppState};
use uuid::Uuid;

pub const SETUP_TOKEN: &str = "integration-setup-token";
pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const ADMIN_EMAIL: &str = "root@taskboard.test";

pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    _dir: tempfile::TempDir,
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub api: ApiClient,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        base_url: "http://127.0.0.1".into(),
        jwt_secret: JWT_SECRET.into(),
        registration_open: true,
        setup_token: Some(SETUP_TOKEN.into()),
        admin_email: ADMIN_EMAIL.into(),
        admin_password: "admin1234".into(),
    }
}

pub async fn spawn() -> TestServer {
    spawn_with(test_config()).await
}

pub async fn spawn_with(config: AppConfig) -> TestServer {
    spawn_with_hub(config, ChangeHub::default()).await
}

/// Like [`spawn_with`], with a caller-sized change hub.
pub async fn spawn_with_hub(config: AppConfig, changes: ChangeHub) -> TestServer {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = storage::init_db(dir.path()).expect("init db");
    let state = AppState {
        changes,
        ..AppState::new(db, config)
    };
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        state,
        _dir: dir,
    }
}

impl TestServer {
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(10)).expect("client")
    }

    /// Insert a user with `role` directly and hand back a signed-in client.
    /// Skips password hashing; such users cannot log in with a password.
    pub fn user(&self, name: &str, role: Role) -> TestUser {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}-{}@taskboard.test", name.to_lowercase(), &id[..8]);
        {
            let conn = self.state.db.conn();
            storage::execute(&conn, users::insert(&id, &email, name, "00", "00", role))
                .expect("insert user");
        }
        let mut api = self.client();
        api.set_auth(crypto::sign_jwt(&id, JWT_SECRET, service::now_unix()));
        TestUser { id, email, api }
    }

    pub fn set_role(&self, user_id: &str, role: Role) {
        let conn = self.state.db.conn();
        storage::execute(&conn, users::update_role(user_id, role)).expect("update role");
    }
}

/// Status of a failed client call, for asserting on error responses.
pub fn status_of<T: std::fmt::Debug>(result: anyhow::Result<T>) -> u16 {
    let err = result.expect_err("expected an error response");
    taskboard_api_client::error_status(&err)
        .unwrap_or_else(|| panic!("not an API error: {err:#}"))
        .as_u16()
}
