use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};
use taskboard_api::{CreateProjectRequest, UpdateProjectRequest};

use crate::output::{self, emit, OutputFormat};
use crate::session;

#[derive(Debug, Clone, Args)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    pub action: ProjectsAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProjectsAction {
    /// List projects, optionally for one team
    List {
        #[arg(long)]
        team: Option<String>,
    },
    /// Show a project with its task breakdown and team members
    Show { id: String },
    /// Task breakdown only
    Stats { id: String },
    /// Create a project (manager or admin)
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        team: Option<String>,
        /// CSS color, e.g. "hsl(145, 65%, 45%)"
        #[arg(long)]
        color: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Update fields; an empty string clears description, team or deadline
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Delete a project and all of its tasks
    Delete { id: String },
}

/// `None` leaves a field alone; `""` clears it.
pub fn nullable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| Some(v).filter(|v| !v.trim().is_empty()))
}

pub async fn run(args: ProjectsArgs, format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    match args.action {
        ProjectsAction::List { team } => {
            let resp = client.list_projects(team.as_deref()).await?;
            emit(format, &resp, |out| output::write_projects(out, &resp.projects))
        }
        ProjectsAction::Show { id } => {
            let detail = client.get_project(&id).await?;
            emit(format, &detail, |out| {
                let project = &detail.project;
                writeln!(out, "{} ({})", project.name, project.color)?;
                if let Some(description) = &project.description {
                    writeln!(out, "  {description}")?;
                }
                if let Some(deadline) = &project.deadline {
                    writeln!(out, "  deadline: {deadline}")?;
                }
                output::write_stats(out, &detail.stats)?;
                writeln!(out, "Team members ({}):", detail.members.len())?;
                output::write_members(out, &detail.members)
            })
        }
        ProjectsAction::Stats { id } => {
            let stats = client.project_stats(&id).await?;
            emit(format, &stats, |out| output::write_stats(out, &stats))
        }
        ProjectsAction::Create {
            name,
            description,
            team,
            color,
            deadline,
        } => {
            let project = client
                .create_project(&CreateProjectRequest {
                    name,
                    description,
                    team_id: team,
                    color,
                    deadline,
                })
                .await?;
            emit(format, &project, |out| {
                writeln!(out, "Created project {} ({})", project.name, project.id)
            })
        }
        ProjectsAction::Update {
            id,
            name,
            description,
            team,
            color,
            deadline,
        } => {
            let req = UpdateProjectRequest {
                name,
                description: nullable(description),
                team_id: nullable(team),
                color,
                deadline: nullable(deadline),
            };
            let project = client.update_project(&id, &req).await?;
            emit(format, &project, |out| {
                writeln!(out, "Updated project {}", project.name)
            })
        }
        ProjectsAction::Delete { id } => {
            client.delete_project(&id).await?;
            println!("Deleted project {id}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_distinguishes_absent_and_clear() {
        assert_eq!(nullable(None), None);
        assert_eq!(nullable(Some("  ".into())), Some(None));
        assert_eq!(
            nullable(Some("2025-12-31".into())),
            Some(Some("2025-12-31".to_string()))
        );
    }
}
