use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};
use taskboard_api::{
    CreateTaskRequest, TaskListQuery, TaskPriority, TaskStatus, UpdateTaskRequest,
};

use crate::output::{self, emit, OutputFormat};
use crate::projects_cmd::nullable;
use crate::session;

#[derive(Debug, Clone, Args)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub action: TasksAction,
}

#[derive(Debug, Clone, Args)]
pub struct TaskFilterArgs {
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long, conflicts_with = "mine")]
    pub assignee: Option<String>,
    /// Only tasks assigned to you
    #[arg(long)]
    pub mine: bool,
    /// 1-500
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum TasksAction {
    /// List tasks, newest first
    List {
        #[command(flatten)]
        filter: TaskFilterArgs,
        /// Group into board columns
        #[arg(long)]
        board: bool,
    },
    Show { id: String },
    /// Quick-add a task to a project
    Add {
        #[arg(long)]
        project: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        assignee: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
    },
    /// Move a task to another board column
    Move { id: String, status: TaskStatus },
    /// Assign a task; omit the user to unassign
    Assign { id: String, user: Option<String> },
    /// Edit fields; an empty string clears description or due date
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        due: Option<String>,
        /// Move to another project
        #[arg(long)]
        project: Option<String>,
    },
    Delete { id: String },
}

impl TaskFilterArgs {
    pub fn to_query(&self, my_id: Option<&str>) -> TaskListQuery {
        TaskListQuery {
            project_id: self.project.clone(),
            status: self.status,
            assignee_id: my_id.map(str::to_string).or_else(|| self.assignee.clone()),
            limit: self.limit,
        }
    }
}

pub async fn run(args: TasksArgs, format: OutputFormat) -> Result<()> {
    let client = session::authed_client().await?;
    match args.action {
        TasksAction::List { filter, board } => {
            let my_id = if filter.mine {
                Some(client.me().await?.id)
            } else {
                None
            };
            let resp = client.list_tasks(&filter.to_query(my_id.as_deref())).await?;
            emit(format, &resp, |out| {
                if board {
                    output::write_board(out, &resp.tasks)
                } else {
                    output::write_tasks(out, &resp.tasks)
                }
            })
        }
        TasksAction::Show { id } => {
            let task = client.get_task(&id).await?;
            emit(format, &task, |out| output::write_task(out, &task))
        }
        TasksAction::Add {
            project,
            title,
            description,
            status,
            priority,
            assignee,
            due,
        } => {
            let task = client
                .create_task(&CreateTaskRequest {
                    title,
                    project_id: project,
                    description,
                    status,
                    priority,
                    assignee_id: assignee,
                    due_date: due,
                })
                .await?;
            emit(format, &task, |out| {
                writeln!(out, "Created task {} ({})", task.title, task.id)
            })
        }
        TasksAction::Move { id, status } => {
            let req = UpdateTaskRequest {
                status: Some(status),
                ..Default::default()
            };
            let task = client.update_task(&id, &req).await?;
            emit(format, &task, |out| {
                writeln!(out, "{} -> {}", task.title, task.status)
            })
        }
        TasksAction::Assign { id, user } => {
            let req = UpdateTaskRequest {
                assignee_id: Some(user),
                ..Default::default()
            };
            let task = client.update_task(&id, &req).await?;
            emit(format, &task, |out| {
                let who = task
                    .assignee
                    .as_ref()
                    .map(|a| a.full_name.as_str())
                    .unwrap_or("nobody");
                writeln!(out, "{} assigned to {}", task.title, who)
            })
        }
        TasksAction::Update {
            id,
            title,
            description,
            priority,
            due,
            project,
        } => {
            let req = UpdateTaskRequest {
                title,
                description: nullable(description),
                priority,
                due_date: nullable(due),
                project_id: project,
                ..Default::default()
            };
            let task = client.update_task(&id, &req).await?;
            emit(format, &task, |out| output::write_task(out, &task))
        }
        TasksAction::Delete { id } => {
            client.delete_task(&id).await?;
            println!("Deleted task {id}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mine_overrides_assignee_filter() {
        let filter = TaskFilterArgs {
            project: Some("p1".into()),
            status: Some(TaskStatus::Review),
            assignee: None,
            mine: true,
            limit: Some(20),
        };
        let query = filter.to_query(Some("me"));
        assert_eq!(query.assignee_id.as_deref(), Some("me"));
        assert_eq!(query.project_id.as_deref(), Some("p1"));
        assert_eq!(query.status, Some(TaskStatus::Review));
        assert_eq!(query.limit, Some(20));

        let filter = TaskFilterArgs {
            assignee: Some("u2".into()),
            mine: false,
            ..filter
        };
        assert_eq!(filter.to_query(None).assignee_id.as_deref(), Some("u2"));
    }

    #[test]
    fn status_args_parse_wire_names() {
        use clap::Parser;

        #[derive(Parser)]
        struct Harness {
            #[command(subcommand)]
            action: TasksAction,
        }

        let parsed = Harness::try_parse_from(["t", "move", "abc", "in_progress"]).unwrap();
        match parsed.action {
            TasksAction::Move { id, status } => {
                assert_eq!(id, "abc");
                assert_eq!(status, TaskStatus::InProgress);
            }
            _ => panic!("expected move"),
        }
        assert!(Harness::try_parse_from(["t", "move", "abc", "blocked"]).is_err());
    }
}
