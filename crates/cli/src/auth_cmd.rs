use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{Input, Password};
use taskboard_api::{
    ChangePasswordRequest, LoginRequest, LogoutRequest, RegisterRequest, UpdateProfileRequest,
};

use crate::config;
use crate::output::{emit, OutputFormat};
use crate::session;

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    /// Account email.
    pub email: Option<String>,
    /// Password (prompted when omitted).
    #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    pub email: String,
    /// Display name.
    #[arg(long)]
    pub name: String,
    #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ProfileArgs {
    #[arg(long)]
    pub name: Option<String>,
    /// New avatar URL; pass an empty string to clear it.
    #[arg(long)]
    pub avatar: Option<String>,
}

fn prompt_password(confirm: bool) -> Result<String> {
    let prompt = Password::new().with_prompt("Password");
    let prompt = if confirm {
        prompt.with_confirmation("Confirm password", "Passwords do not match")
    } else {
        prompt
    };
    prompt.interact().context("read password")
}

fn store_session(email: &str, tokens: &taskboard_api::AuthTokenResponse) -> Result<()> {
    let mut cfg = config::load_config()?;
    let now = chrono::Utc::now().timestamp();
    cfg.auth = Some(session::auth_from_tokens(email, tokens, now));
    config::save_config(&cfg)
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let cfg = config::load_config()?;
    let email = match args.email {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .context("read email")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt_password(false)?,
    };

    let client = session::anonymous_client(&cfg)?;
    let tokens = client
        .login(&LoginRequest {
            email,
            password,
        })
        .await?;
    store_session(&tokens.user.email, &tokens)?;
    println!(
        "Logged in as {} ({}) on {}",
        tokens.user.full_name, tokens.user.role, cfg.server.url
    );
    Ok(())
}

pub async fn register(args: RegisterArgs) -> Result<()> {
    let cfg = config::load_config()?;
    let password = match args.password {
        Some(password) => password,
        None => prompt_password(true)?,
    };

    let client = session::anonymous_client(&cfg)?;
    let tokens = client
        .register(&RegisterRequest {
            email: args.email,
            password,
            full_name: args.name,
        })
        .await?;
    store_session(&tokens.user.email, &tokens)?;
    println!("Account created for {}", tokens.user.email);
    Ok(())
}

/// Revoke the stored refresh token, then forget the session locally even if
/// the server is unreachable.
pub async fn logout() -> Result<()> {
    if config::load_config()?.auth.is_none() {
        println!("Not logged in.");
        return Ok(());
    }

    match session::authed_client().await {
        Ok(client) => {
            // Re-read: building the client may have rotated the refresh token.
            let refresh_token = config::load_config()?
                .auth
                .map(|auth| auth.refresh_token)
                .unwrap_or_default();
            if let Err(e) = client.logout(&LogoutRequest { refresh_token }).await {
                tracing::warn!("server logout failed: {e:#}");
            }
        }
        Err(e) => tracing::warn!("skipping server logout: {e:#}"),
    }

    let mut cfg = config::load_config()?;
    cfg.auth = None;
    config::save_config(&cfg)?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    let me = client.me().await?;
    emit(format, &me, |out| {
        writeln!(out, "{} <{}>", me.full_name, me.email)?;
        writeln!(out, "  id:   {}", me.id)?;
        writeln!(out, "  role: {}", me.role)
    })
}

pub async fn change_password() -> Result<()> {
    let client = session::authed_client().await?;
    let current_password = Password::new()
        .with_prompt("Current password")
        .interact()
        .context("read password")?;
    let new_password = Password::new()
        .with_prompt("New password")
        .with_confirmation("Confirm new password", "Passwords do not match")
        .interact()
        .context("read password")?;

    client
        .change_password(&ChangePasswordRequest {
            current_password,
            new_password,
        })
        .await?;

    // Every refresh token was revoked; the stored one is dead.
    let mut cfg = config::load_config()?;
    cfg.auth = None;
    config::save_config(&cfg)?;
    println!("Password changed. Log in again with the new password.");
    Ok(())
}

pub fn profile_request(args: &ProfileArgs) -> UpdateProfileRequest {
    UpdateProfileRequest {
        full_name: args.name.clone(),
        avatar_url: args
            .avatar
            .as_ref()
            .map(|url| Some(url.clone()).filter(|u| !u.trim().is_empty())),
    }
}

pub async fn update_profile(args: ProfileArgs, format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    let me = client.update_my_profile(&profile_request(&args)).await?;
    emit(format, &me, |out| writeln!(out, "Profile updated: {}", me.full_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_avatar_clears() {
        let req = profile_request(&ProfileArgs {
            name: None,
            avatar: Some(String::new()),
        });
        assert_eq!(req.avatar_url, Some(None));
        assert_eq!(req.full_name, None);

        let req = profile_request(&ProfileArgs {
            name: Some("Lucas King".into()),
            avatar: Some("https://cdn.example.com/a.png".into()),
        });
        assert_eq!(
            req.avatar_url,
            Some(Some("https://cdn.example.com/a.png".into()))
        );

        let req = profile_request(&ProfileArgs {
            name: None,
            avatar: None,
        });
        assert_eq!(req.avatar_url, None);
    }
}
