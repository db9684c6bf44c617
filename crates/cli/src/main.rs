mod auth_cmd;
mod config;
mod dashboard_cmd;
mod output;
mod projects_cmd;
mod session;
mod setup_cmd;
mod tasks_cmd;
mod teams_cmd;
mod users_cmd;
mod watch_cmd;

use clap::{Parser, Subcommand};

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "taskboard", about = "taskboard CLI - teams, projects and tasks")]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login(auth_cmd::LoginArgs),
    /// Create an account (when registration is open)
    Register(auth_cmd::RegisterArgs),
    /// Revoke and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change your password
    Password,
    /// Edit your profile
    Profile(auth_cmd::ProfileArgs),

    /// Show or set configuration
    Config {
        /// Set the server URL
        #[arg(long)]
        server: Option<String>,
    },

    Teams(teams_cmd::TeamsArgs),
    Projects(projects_cmd::ProjectsArgs),
    Tasks(tasks_cmd::TasksArgs),
    Users(users_cmd::UsersArgs),

    /// Counts and recent task progress
    Dashboard,
    /// Search projects, tasks and people
    Search { query: String },
    /// Keep a list on screen, refreshed on every change
    Watch(watch_cmd::WatchArgs),

    /// One-off server bootstrap (requires the setup token)
    Setup(setup_cmd::SetupArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let result = match cli.command {
        Commands::Login(args) => auth_cmd::login(args).await,
        Commands::Register(args) => auth_cmd::register(args).await,
        Commands::Logout => auth_cmd::logout().await,
        Commands::Whoami => auth_cmd::whoami(format).await,
        Commands::Password => auth_cmd::change_password().await,
        Commands::Profile(args) => auth_cmd::update_profile(args, format).await,
        Commands::Config { server } => match server {
            Some(url) => config::set_server(&url),
            None => config::show_config(),
        },
        Commands::Teams(args) => teams_cmd::run(args, format).await,
        Commands::Projects(args) => projects_cmd::run(args, format).await,
        Commands::Tasks(args) => tasks_cmd::run(args, format).await,
        Commands::Users(args) => users_cmd::run(args, format).await,
        Commands::Dashboard => dashboard_cmd::dashboard(format).await,
        Commands::Search { query } => dashboard_cmd::search(&query, format).await,
        Commands::Watch(args) => watch_cmd::run(args, format).await,
        Commands::Setup(args) => setup_cmd::run(args, format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_format_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["taskboard", "dashboard", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Dashboard));
    }
}
