//! Live list that re-reads whenever the server reports a change.

use std::time::Duration;

use anyhow::Result;
use clap::{Args, ValueEnum};
use taskboard_api::{
    ChangeTable, ListProjectsResponse, ListTasksResponse, ListTeamsResponse, TaskListQuery,
};
use taskboard_api_client::{key, ApiClient, QueryCache, QueryKey, SubscriptionState};

use crate::output::{self, emit, OutputFormat};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchTarget {
    Tasks,
    Projects,
    Teams,
}

impl WatchTarget {
    /// Tables whose changes make the list stale.
    fn tables(self) -> &'static [ChangeTable] {
        match self {
            Self::Tasks => &[ChangeTable::Tasks],
            Self::Projects => &[ChangeTable::Projects],
            // member_count moves with memberships
            Self::Teams => &[ChangeTable::Teams, ChangeTable::TeamMembers],
        }
    }

    fn root(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Projects => "projects",
            Self::Teams => "teams",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[arg(value_enum, default_value_t = WatchTarget::Tasks)]
    pub target: WatchTarget,
    /// Only tasks of this project
    #[arg(long)]
    pub project: Option<String>,
    /// Only projects of this team
    #[arg(long)]
    pub team: Option<String>,
    /// Render tasks as a board
    #[arg(long)]
    pub board: bool,
}

impl WatchArgs {
    pub fn query_key(&self) -> QueryKey {
        let scope = match self.target {
            WatchTarget::Tasks => self.project.as_deref(),
            WatchTarget::Projects => self.team.as_deref(),
            WatchTarget::Teams => None,
        };
        key([self.target.root(), scope.unwrap_or("all")])
    }
}

async fn render(
    client: &ApiClient,
    cache: &QueryCache,
    args: &WatchArgs,
    format: OutputFormat,
) -> Result<()> {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    if format == OutputFormat::Text {
        println!("--- {} @ {stamp} ---", args.target.root());
    }

    match args.target {
        WatchTarget::Tasks => {
            let query = TaskListQuery {
                project_id: args.project.clone(),
                ..Default::default()
            };
            let resp: ListTasksResponse = cache
                .fetch(args.query_key(), || client.list_tasks(&query))
                .await?;
            emit(format, &resp, |out| {
                if args.board {
                    output::write_board(out, &resp.tasks)
                } else {
                    output::write_tasks(out, &resp.tasks)
                }
            })
        }
        WatchTarget::Projects => {
            let resp: ListProjectsResponse = cache
                .fetch(args.query_key(), || client.list_projects(args.team.as_deref()))
                .await?;
            emit(format, &resp, |out| output::write_projects(out, &resp.projects))
        }
        WatchTarget::Teams => {
            let resp: ListTeamsResponse = cache
                .fetch(args.query_key(), || client.list_teams())
                .await?;
            emit(format, &resp, |out| output::write_teams(out, &resp.teams))
        }
    }
}

pub async fn run(args: WatchArgs, format: OutputFormat) -> Result<()> {
    // The feed stays open past token expiry; refetches go through `session`.
    let mut session = Session::open().await?;
    let cache = QueryCache::new();
    let mut generation = cache.subscribe_generation();

    let prefix = key([args.target.root()]);
    let mut subscriptions = Vec::new();
    for table in args.target.tables() {
        let client = session.client().await?;
        subscriptions.push(client.watch(&cache, *table, prefix.clone()).await?);
    }
    tracing::debug!(list = args.target.root(), "watching for changes");

    render(session.client().await?, &cache, &args, format).await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            changed = generation.changed() => {
                if changed.is_err() {
                    break;
                }
                render(session.client().await?, &cache, &args, format).await?;
            }
            _ = ticker.tick() => {
                if subscriptions
                    .iter()
                    .any(|s| s.state() == SubscriptionState::Unsubscribed)
                {
                    eprintln!("Change feed closed; live updates stopped.");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
