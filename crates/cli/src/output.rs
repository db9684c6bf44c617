use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use taskboard_api::{
    MemberResponse, ProjectResponse, TaskResponse, TaskStats, TeamResponse, UserResponse,
    UserSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Emit `value` as pretty JSON, or run `text` for the human rendering.
pub fn emit<T, F>(format: OutputFormat, value: &T, text: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
        OutputFormat::Text => text(&mut out)?,
    }
    Ok(())
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn assignee_name(assignee: Option<&UserSummary>) -> &str {
    assignee.map(|a| a.full_name.as_str()).unwrap_or("unassigned")
}

pub fn write_tasks(out: &mut dyn Write, tasks: &[TaskResponse]) -> std::io::Result<()> {
    if tasks.is_empty() {
        return writeln!(out, "No tasks.");
    }
    for task in tasks {
        writeln!(
            out,
            "{:<36}  {:<11}  {:<6}  {:<10}  {:<20}  {}",
            task.id,
            task.status.as_str(),
            task.priority.as_str(),
            or_dash(task.due_date.as_deref()),
            assignee_name(task.assignee.as_ref()),
            task.title,
        )?;
    }
    Ok(())
}

pub fn write_task(out: &mut dyn Write, task: &TaskResponse) -> std::io::Result<()> {
    writeln!(out, "{}", task.title)?;
    writeln!(out, "  id:          {}", task.id)?;
    writeln!(out, "  project:     {}", task.project_id)?;
    writeln!(out, "  status:      {}", task.status)?;
    writeln!(out, "  priority:    {}", task.priority)?;
    writeln!(out, "  assignee:    {}", assignee_name(task.assignee.as_ref()))?;
    writeln!(out, "  due:         {}", or_dash(task.due_date.as_deref()))?;
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        writeln!(out, "  description: {description}")?;
    }
    Ok(())
}

/// Tasks grouped into board columns, in status order.
pub fn write_board(out: &mut dyn Write, tasks: &[TaskResponse]) -> std::io::Result<()> {
    for status in taskboard_api::TaskStatus::ALL {
        let column: Vec<&TaskResponse> = tasks.iter().filter(|t| t.status == *status).collect();
        writeln!(out, "== {} ({}) ==", status, column.len())?;
        for task in column {
            writeln!(
                out,
                "  [{}] {}  ({}, {})",
                task.priority,
                task.title,
                assignee_name(task.assignee.as_ref()),
                &task.id[..8.min(task.id.len())],
            )?;
        }
    }
    Ok(())
}

pub fn write_projects(out: &mut dyn Write, projects: &[ProjectResponse]) -> std::io::Result<()> {
    if projects.is_empty() {
        return writeln!(out, "No projects.");
    }
    for project in projects {
        writeln!(
            out,
            "{:<36}  {:<10}  {}",
            project.id,
            or_dash(project.deadline.as_deref()),
            project.name,
        )?;
    }
    Ok(())
}

pub fn write_teams(out: &mut dyn Write, teams: &[TeamResponse]) -> std::io::Result<()> {
    if teams.is_empty() {
        return writeln!(out, "No teams.");
    }
    for team in teams {
        writeln!(
            out,
            "{:<36}  {:>3} members  {}",
            team.id, team.member_count, team.name
        )?;
    }
    Ok(())
}

pub fn write_members(out: &mut dyn Write, members: &[MemberResponse]) -> std::io::Result<()> {
    if members.is_empty() {
        return writeln!(out, "  (no members)");
    }
    for member in members {
        writeln!(
            out,
            "  {:<36}  {:<24}  user {}",
            member.id, member.full_name, member.user_id
        )?;
    }
    Ok(())
}

pub fn write_users(out: &mut dyn Write, users: &[UserResponse]) -> std::io::Result<()> {
    for user in users {
        writeln!(
            out,
            "{:<36}  {:<9}  {:<24}  {}",
            user.id,
            user.role.as_str(),
            user.full_name,
            user.email
        )?;
    }
    Ok(())
}

pub fn write_stats(out: &mut dyn Write, stats: &TaskStats) -> std::io::Result<()> {
    writeln!(
        out,
        "  {} tasks: {} todo, {} in progress, {} review, {} done ({}% complete)",
        stats.total, stats.todo, stats.in_progress, stats.review, stats.done, stats.completion_rate
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_api::{TaskPriority, TaskStatus};

    fn task(id: &str, status: TaskStatus, assignee: Option<&str>) -> TaskResponse {
        TaskResponse {
            id: id.into(),
            title: format!("task {id}"),
            description: None,
            status,
            priority: TaskPriority::High,
            assignee_id: assignee.map(|_| "u1".to_string()),
            assignee: assignee.map(|name| UserSummary {
                id: "u1".into(),
                full_name: name.into(),
                avatar_url: None,
            }),
            project_id: "p1".into(),
            due_date: None,
            created_by: None,
            created_at: "2025-01-01 00:00:00".into(),
            updated_at: "2025-01-01 00:00:00".into(),
        }
    }

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn board_groups_by_status() {
        let tasks = vec![
            task("aaaaaaaa-1", TaskStatus::Done, Some("Mike Chen")),
            task("bbbbbbbb-2", TaskStatus::Todo, None),
        ];
        let text = render(|out| write_board(out, &tasks));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "== todo (1) ==");
        assert_eq!(lines[1], "  [high] task bbbbbbbb-2  (unassigned, bbbbbbbb)");
        assert!(text.contains("== in_progress (0) =="));
        assert!(text.contains("(Mike Chen, aaaaaaaa)"));
    }

    #[test]
    fn empty_lists_say_so() {
        assert_eq!(render(|out| write_tasks(out, &[])), "No tasks.\n");
        assert_eq!(render(|out| write_teams(out, &[])), "No teams.\n");
    }

    #[test]
    fn stats_line() {
        let stats = TaskStats::from_statuses([TaskStatus::Done, TaskStatus::Todo, TaskStatus::Done]);
        assert_eq!(
            render(|out| write_stats(out, &stats)),
            "  3 tasks: 1 todo, 0 in progress, 0 review, 2 done (67% complete)\n"
        );
    }
}
