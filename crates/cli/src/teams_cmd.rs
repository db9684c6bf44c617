use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};
use taskboard_api::{CreateTeamRequest, UpdateTeamRequest};

use crate::output::{self, emit, OutputFormat};
use crate::projects_cmd::nullable;
use crate::session;

#[derive(Debug, Clone, Args)]
pub struct TeamsArgs {
    #[command(subcommand)]
    pub action: TeamsAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum TeamsAction {
    /// List teams with member counts
    List,
    /// Show a team and its members
    Show { id: String },
    /// Create a team (manager or admin)
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a team or change its description
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// New description; an empty string clears it.
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a team; its projects are kept without a team
    Delete { id: String },
    /// Add a user to a team (team lead and above)
    AddMember { team_id: String, user_id: String },
    /// Remove a membership by its member id
    RemoveMember { team_id: String, member_id: String },
}

pub async fn run(args: TeamsArgs, format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    match args.action {
        TeamsAction::List => {
            let resp = client.list_teams().await?;
            emit(format, &resp, |out| output::write_teams(out, &resp.teams))
        }
        TeamsAction::Show { id } => {
            let team = client.get_team(&id).await?;
            emit(format, &team, |out| {
                writeln!(out, "{}", team.team.name)?;
                if let Some(description) = &team.team.description {
                    writeln!(out, "  {description}")?;
                }
                writeln!(out, "Members ({}):", team.members.len())?;
                output::write_members(out, &team.members)
            })
        }
        TeamsAction::Create { name, description } => {
            let team = client
                .create_team(&CreateTeamRequest { name, description })
                .await?;
            emit(format, &team, |out| {
                writeln!(out, "Created team {} ({})", team.name, team.id)
            })
        }
        TeamsAction::Update {
            id,
            name,
            description,
        } => {
            let req = UpdateTeamRequest {
                name,
                description: nullable(description),
            };
            let team = client.update_team(&id, &req).await?;
            emit(format, &team, |out| writeln!(out, "Updated team {}", team.name))
        }
        TeamsAction::Delete { id } => {
            client.delete_team(&id).await?;
            println!("Deleted team {id}");
            Ok(())
        }
        TeamsAction::AddMember { team_id, user_id } => {
            let member = client.add_member(&team_id, &user_id).await?;
            emit(format, &member, |out| {
                writeln!(out, "Added {} (member id {})", member.full_name, member.id)
            })
        }
        TeamsAction::RemoveMember { team_id, member_id } => {
            client.remove_member(&team_id, &member_id).await?;
            println!("Removed member {member_id}");
            Ok(())
        }
    }
}
