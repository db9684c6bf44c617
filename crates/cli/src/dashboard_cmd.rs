use std::io::Write;

use anyhow::Result;

use crate::output::{self, emit, OutputFormat};
use crate::session;

pub async fn dashboard(format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    let dash = client.dashboard().await?;
    emit(format, &dash, |out| {
        writeln!(
            out,
            "{} projects, {} teams, {} users",
            dash.projects, dash.teams, dash.users
        )?;
        writeln!(out, "Recent tasks:")?;
        output::write_stats(out, &dash.recent)?;
        writeln!(out, "Open tasks assigned to you: {}", dash.my_open_tasks)
    })
}

pub async fn search(query: &str, format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    let results = client.search(query).await?;
    emit(format, &results, |out| {
        if results.projects.is_empty() && results.tasks.is_empty() && results.users.is_empty() {
            return writeln!(out, "No matches for \"{query}\".");
        }
        for project in &results.projects {
            writeln!(out, "project  {}  {}", project.id, project.name)?;
        }
        for task in &results.tasks {
            writeln!(out, "task     {}  {} [{}]", task.id, task.title, task.status)?;
        }
        for user in &results.users {
            writeln!(out, "user     {}  {}", user.id, user.full_name)?;
        }
        Ok(())
    })
}
