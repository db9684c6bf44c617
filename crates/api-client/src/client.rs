use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use taskboard_api::*;

use crate::cache::{QueryCache, QueryKey};
use crate::sse::{FeedMessage, SseDecoder};
use crate::subscription::Subscription;

/// Failure reported by the server or detected before sending.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Non-2xx response; `message` is the server's `{"error": ..}` text.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("auth token not set")]
    NotAuthenticated,
}

/// HTTP status carried by an error returned from [`ApiClient`], if any.
pub fn error_status(err: &anyhow::Error) -> Option<StatusCode> {
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Api { status, .. }) => Some(*status),
        _ => None,
    }
}

/// Live change feed from `GET /api/realtime`.
pub type ChangeStream = BoxStream<'static, Result<FeedMessage>>;

/// Typed HTTP client for the taskboard API.
///
/// Every method maps to one endpoint and uses the stored bearer token.
/// Errors are never retried; the caller decides how to surface them.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Create a new client with the given base URL and per-request timeout.
    ///
    /// The timeout applies to ordinary requests only; the realtime feed
    /// stays open until dropped.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            auth_token: None,
        }
    }

    pub fn set_auth(&mut self, token: String) {
        self.auth_token = Some(token);
    }

    pub fn clear_auth(&mut self) {
        self.auth_token = None;
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        if self.auth_token.is_none() {
            return Err(ClientError::NotAuthenticated.into());
        }
        Ok(self.request(method, path).timeout(self.timeout))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.authed(Method::GET, path)?.send().await?;
        parse_response(resp).await
    }

    async fn get_query<Q: Serialize, T: DeserializeOwned>(&self, path: &str, query: &Q) -> Result<T> {
        let resp = self.authed(Method::GET, path)?.query(query).send().await?;
        parse_response(resp).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self.authed(method, path)?.json(body).send().await?;
        parse_response(resp).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.authed(Method::DELETE, path)?.send().await?;
        expect_success(resp).await
    }

    /// Unauthenticated JSON POST (sign-in flows).
    async fn post_public<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .client
            .post(self.url(path))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Health ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .client
            .get(self.url("/health"))
            .timeout(self.timeout)
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Auth ──────────────────────────────────────────────────────────────

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthTokenResponse> {
        self.post_public("/auth/register", req).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthTokenResponse> {
        self.post_public("/auth/login", req).await
    }

    pub async fn refresh(&self, req: &RefreshRequest) -> Result<AuthTokenResponse> {
        self.post_public("/auth/refresh", req).await
    }

    pub async fn logout(&self, req: &LogoutRequest) -> Result<OkResponse> {
        self.send_json(Method::POST, "/auth/logout", req).await
    }

    pub async fn me(&self) -> Result<UserResponse> {
        self.get("/auth/me").await
    }

    pub async fn change_password(&self, req: &ChangePasswordRequest) -> Result<OkResponse> {
        self.send_json(Method::PUT, "/auth/password", req).await
    }

    pub async fn update_my_profile(&self, req: &UpdateProfileRequest) -> Result<UserResponse> {
        self.send_json(Method::PUT, "/auth/profile", req).await
    }

    // ── Users ─────────────────────────────────────────────────────────────

    pub async fn list_users(&self) -> Result<ListUsersResponse> {
        self.get("/users").await
    }

    pub async fn update_role(&self, user_id: &str, role: Role) -> Result<UserResponse> {
        self.send_json(
            Method::PUT,
            &format!("/users/{user_id}/role"),
            &UpdateRoleRequest { role },
        )
        .await
    }

    pub async fn update_user_profile(
        &self,
        user_id: &str,
        req: &UpdateProfileRequest,
    ) -> Result<UserResponse> {
        self.send_json(Method::PUT, &format!("/users/{user_id}/profile"), req)
            .await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.delete(&format!("/users/{user_id}")).await
    }

    // ── Teams ─────────────────────────────────────────────────────────────

    pub async fn list_teams(&self) -> Result<ListTeamsResponse> {
        self.get("/teams").await
    }

    pub async fn create_team(&self, req: &CreateTeamRequest) -> Result<TeamResponse> {
        self.send_json(Method::POST, "/teams", req).await
    }

    pub async fn get_team(&self, id: &str) -> Result<TeamDetailResponse> {
        self.get(&format!("/teams/{id}")).await
    }

    pub async fn update_team(&self, id: &str, req: &UpdateTeamRequest) -> Result<TeamResponse> {
        self.send_json(Method::PUT, &format!("/teams/{id}"), req).await
    }

    pub async fn delete_team(&self, id: &str) -> Result<()> {
        self.delete(&format!("/teams/{id}")).await
    }

    pub async fn list_members(&self, team_id: &str) -> Result<ListMembersResponse> {
        self.get(&format!("/teams/{team_id}/members")).await
    }

    pub async fn add_member(&self, team_id: &str, user_id: &str) -> Result<MemberResponse> {
        self.send_json(
            Method::POST,
            &format!("/teams/{team_id}/members"),
            &AddMemberRequest {
                user_id: user_id.to_string(),
            },
        )
        .await
    }

    pub async fn remove_member(&self, team_id: &str, member_id: &str) -> Result<()> {
        self.delete(&format!("/teams/{team_id}/members/{member_id}"))
            .await
    }

    // ── Projects ──────────────────────────────────────────────────────────

    pub async fn list_projects(&self, team_id: Option<&str>) -> Result<ListProjectsResponse> {
        let query = ProjectListQuery {
            team_id: team_id.map(str::to_string),
        };
        self.get_query("/projects", &query).await
    }

    pub async fn create_project(&self, req: &CreateProjectRequest) -> Result<ProjectResponse> {
        self.send_json(Method::POST, "/projects", req).await
    }

    pub async fn get_project(&self, id: &str) -> Result<ProjectDetailResponse> {
        self.get(&format!("/projects/{id}")).await
    }

    pub async fn project_stats(&self, id: &str) -> Result<TaskStats> {
        self.get(&format!("/projects/{id}/stats")).await
    }

    pub async fn update_project(
        &self,
        id: &str,
        req: &UpdateProjectRequest,
    ) -> Result<ProjectResponse> {
        self.send_json(Method::PUT, &format!("/projects/{id}"), req)
            .await
    }

    pub async fn delete_project(&self, id: &str) -> Result<()> {
        self.delete(&format!("/projects/{id}")).await
    }

    // ── Tasks ─────────────────────────────────────────────────────────────

    pub async fn list_tasks(&self, query: &TaskListQuery) -> Result<ListTasksResponse> {
        self.get_query("/tasks", query).await
    }

    pub async fn create_task(&self, req: &CreateTaskRequest) -> Result<TaskResponse> {
        self.send_json(Method::POST, "/tasks", req).await
    }

    pub async fn get_task(&self, id: &str) -> Result<TaskResponse> {
        self.get(&format!("/tasks/{id}")).await
    }

    pub async fn update_task(&self, id: &str, req: &UpdateTaskRequest) -> Result<TaskResponse> {
        self.send_json(Method::PUT, &format!("/tasks/{id}"), req).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        self.delete(&format!("/tasks/{id}")).await
    }

    // ── Dashboard & search ────────────────────────────────────────────────

    pub async fn dashboard(&self) -> Result<DashboardResponse> {
        self.get("/dashboard").await
    }

    pub async fn search(&self, q: &str) -> Result<SearchResponse> {
        self.get_query("/search", &SearchQuery { q: q.to_string() })
            .await
    }

    // ── Setup ─────────────────────────────────────────────────────────────

    pub async fn setup_admin(&self, setup_token: &str) -> Result<SetupAdminResponse> {
        let resp = self
            .client
            .post(self.url("/setup/admin"))
            .timeout(self.timeout)
            .header(SETUP_TOKEN_HEADER, setup_token)
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn setup_seed(&self, setup_token: &str) -> Result<SeedResponse> {
        let resp = self
            .client
            .post(self.url("/setup/seed"))
            .timeout(self.timeout)
            .header(SETUP_TOKEN_HEADER, setup_token)
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Realtime ──────────────────────────────────────────────────────────

    /// Open the change feed for `tables` (all tables when empty).
    ///
    /// Resolves once the server has registered the subscription, so changes
    /// made after this returns are delivered. The stream ends on network loss.
    pub async fn subscribe_changes(&self, tables: &[ChangeTable]) -> Result<ChangeStream> {
        let mut req = self.request(Method::GET, "/realtime");
        if self.auth_token.is_none() {
            return Err(ClientError::NotAuthenticated.into());
        }
        if !tables.is_empty() {
            let list = tables
                .iter()
                .map(ChangeTable::as_str)
                .collect::<Vec<_>>()
                .join(",");
            req = req.query(&[("tables", list)]);
        }
        let resp = req.send().await?;
        let resp = check_status(resp).await?;

        let messages = resp
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let batch: Vec<Result<FeedMessage>> = match chunk {
                    Ok(bytes) => decoder
                        .push(&bytes)
                        .into_iter()
                        .filter_map(|frame| FeedMessage::from_frame(&frame).transpose())
                        .collect(),
                    Err(e) => vec![Err(e.into())],
                };
                futures::future::ready(Some(stream::iter(batch)))
            })
            .flatten();

        Ok(messages.boxed())
    }

    /// Keep `cache` entries under `prefix` fresh: every change to `table`
    /// drops them so the next read re-queries.
    pub async fn watch(
        &self,
        cache: &QueryCache,
        table: ChangeTable,
        prefix: QueryKey,
    ) -> Result<Subscription> {
        let feed = self.subscribe_changes(&[table]).await?;
        Ok(Subscription::spawn(feed, table, prefix, cache.clone()))
    }
}

/// Turn a non-2xx response into [`ClientError::Api`].
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(ClientError::Api { status, message }.into())
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let resp = check_status(resp).await?;
    Ok(resp.json().await?)
}

async fn expect_success(resp: reqwest::Response) -> Result<()> {
    check_status(resp).await.map(|_| ())
}
