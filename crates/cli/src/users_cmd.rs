use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};
use taskboard_api::Role;

use crate::auth_cmd::{profile_request, ProfileArgs};
use crate::output::{self, emit, OutputFormat};
use crate::session;

#[derive(Debug, Clone, Args)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub action: UsersAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum UsersAction {
    /// List everyone with their role
    List,
    /// Change a user's role (admin only)
    Role { id: String, role: Role },
    /// Edit another user's profile (admin only)
    Profile {
        id: String,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Delete a user (admin only)
    Delete { id: String },
}

pub async fn run(args: UsersArgs, format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    match args.action {
        UsersAction::List => {
            let resp = client.list_users().await?;
            emit(format, &resp, |out| output::write_users(out, &resp.users))
        }
        UsersAction::Role { id, role } => {
            let user = client.update_role(&id, role).await?;
            emit(format, &user, |out| {
                writeln!(out, "{} is now {}", user.full_name, user.role)
            })
        }
        UsersAction::Profile { id, profile } => {
            let user = client
                .update_user_profile(&id, &profile_request(&profile))
                .await?;
            emit(format, &user, |out| {
                writeln!(out, "Profile updated: {}", user.full_name)
            })
        }
        UsersAction::Delete { id } => {
            client.delete_user(&id).await?;
            println!("Deleted user {id}");
            Ok(())
        }
    }
}
