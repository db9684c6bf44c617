//! Builds an [`ApiClient`] from the stored config and keeps its tokens fresh.

use std::time::Duration;

use anyhow::{Context, Result};
use taskboard_api::{AuthTokenResponse, RefreshRequest};
use taskboard_api_client::ApiClient;

use crate::config::{self, AuthConfig, CliConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh this many seconds before the access token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

pub fn anonymous_client(config: &CliConfig) -> Result<ApiClient> {
    ApiClient::new(&config.server.url, REQUEST_TIMEOUT)
}

pub fn auth_from_tokens(email: &str, tokens: &AuthTokenResponse, now: i64) -> AuthConfig {
    AuthConfig {
        email: email.to_string(),
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        expires_at: now + tokens.expires_in as i64,
    }
}

fn needs_refresh(expires_at: i64, now: i64) -> bool {
    expires_at - EXPIRY_MARGIN_SECS <= now
}

/// Client carrying the stored access token, rotated first if it is about
/// to expire. Fails when nobody is logged in.
pub async fn authed_client() -> Result<ApiClient> {
    Ok(Session::open().await?.client)
}

/// A signed-in client for long-running commands. [`Session::client`]
/// re-reads the stored session once the access token nears expiry.
pub struct Session {
    client: ApiClient,
    expires_at: i64,
}

impl Session {
    pub async fn open() -> Result<Self> {
        let mut config = config::load_config()?;
        let mut client = anonymous_client(&config)?;
        let Some(mut auth) = config.auth.clone() else {
            anyhow::bail!("not logged in (run `taskboard login`)");
        };

        let now = chrono::Utc::now().timestamp();
        if needs_refresh(auth.expires_at, now) {
            tracing::debug!("access token expired, refreshing");
            let tokens = client
                .refresh(&RefreshRequest {
                    refresh_token: auth.refresh_token.clone(),
                })
                .await
                .context("session expired; run `taskboard login` again")?;
            auth = auth_from_tokens(&auth.email, &tokens, now);
            config.auth = Some(auth.clone());
            config::save_config(&config)?;
        }

        client.set_auth(auth.access_token);
        Ok(Self {
            client,
            expires_at: auth.expires_at,
        })
    }

    fn is_stale(&self, now: i64) -> bool {
        needs_refresh(self.expires_at, now)
    }

    pub async fn client(&mut self) -> Result<&ApiClient> {
        if self.is_stale(chrono::Utc::now().timestamp()) {
            *self = Self::open().await?;
        }
        Ok(&self.client)
    }
}
