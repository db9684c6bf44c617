use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config;
use crate::output::{emit, OutputFormat};
use crate::session;

#[derive(Debug, Clone, Args)]
pub struct SetupArgs {
    /// Value of the server's SETUP_TOKEN
    #[arg(long, env = "SETUP_TOKEN", hide_env_values = true)]
    pub token: String,
    #[command(subcommand)]
    pub action: SetupAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SetupAction {
    /// Create the administrator account, or promote it if it exists
    Admin,
    /// Load demonstration users, teams, projects and tasks
    Seed,
}

pub async fn run(args: SetupArgs, format: OutputFormat) -> Result<()> {
    let cfg = config::load_config()?;
    let client = session::anonymous_client(&cfg)?;
    match args.action {
        SetupAction::Admin => {
            let resp = client.setup_admin(&args.token).await?;
            emit(format, &resp, |out| {
                writeln!(out, "{}", resp.message)?;
                writeln!(out, "  email:   {}", resp.email)?;
                writeln!(out, "  user id: {}", resp.user_id)
            })
        }
        SetupAction::Seed => {
            let resp = client.setup_seed(&args.token).await?;
            emit(format, &resp, |out| {
                writeln!(out, "{}", resp.message)?;
                writeln!(
                    out,
                    "  {} users, {} teams, {} projects, {} tasks",
                    resp.stats.users, resp.stats.teams, resp.stats.projects, resp.stats.tasks
                )
            })
        }
    }
}
