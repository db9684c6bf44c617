//! Demonstration data for `POST /api/setup/seed`.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::crypto::PasswordHash;
use taskboard_api::db::{projects, tasks, teams, users};
use taskboard_api::{ChangeEvent, ChangeOp, ChangeTable, Role, SeedStats, TaskPriority, TaskStatus};

use crate::storage;

pub const DEMO_PASSWORD: &str = "user1234";

/// `(email, full name)` of every demo account.
pub const USERS: [(&str, &str); 15] = [
    ("sarah.johnson@company.com", "Sarah Johnson"),
    ("mike.chen@company.com", "Mike Chen"),
    ("emma.davis@company.com", "Emma Davis"),
    ("james.wilson@company.com", "James Wilson"),
    ("olivia.brown@company.com", "Olivia Brown"),
    ("liam.martinez@company.com", "Liam Martinez"),
    ("sophia.garcia@company.com", "Sophia Garcia"),
    ("noah.rodriguez@company.com", "Noah Rodriguez"),
    ("ava.lee@company.com", "Ava Lee"),
    ("ethan.walker@company.com", "Ethan Walker"),
    ("isabella.hall@company.com", "Isabella Hall"),
    ("mason.allen@company.com", "Mason Allen"),
    ("mia.young@company.com", "Mia Young"),
    ("lucas.king@company.com", "Lucas King"),
    ("charlotte.wright@company.com", "Charlotte Wright"),
];

struct SeedTeam {
    name: &'static str,
    description: &'static str,
    /// Indices into [`USERS`].
    members: [usize; 5],
}

const TEAMS: [SeedTeam; 3] = [
    SeedTeam {
        name: "Design Team",
        description: "UI/UX and Visual Design",
        members: [0, 1, 2, 3, 4],
    },
    SeedTeam {
        name: "Development Team",
        description: "Frontend and Backend Development",
        members: [1, 5, 6, 7, 8],
    },
    SeedTeam {
        name: "Marketing Team",
        description: "Marketing and Growth",
        members: [0, 9, 10, 11, 12],
    },
];

struct SeedProject {
    name: &'static str,
    description: &'static str,
    color: &'static str,
    team: usize,
    creator: usize,
}

const PROJECTS: [SeedProject; 3] = [
    SeedProject {
        name: "Website Redesign",
        description: "Complete overhaul of company website",
        color: "hsl(215, 85%, 55%)",
        team: 0,
        creator: 0,
    },
    SeedProject {
        name: "Mobile App",
        description: "iOS and Android app development",
        color: "hsl(145, 65%, 45%)",
        team: 1,
        creator: 1,
    },
    SeedProject {
        name: "Marketing Campaign",
        description: "Q4 marketing initiatives",
        color: "hsl(35, 90%, 55%)",
        team: 2,
        creator: 0,
    },
];

struct SeedTask {
    title: &'static str,
    description: &'static str,
    status: TaskStatus,
    priority: TaskPriority,
    project: usize,
    assignee: usize,
    creator: usize,
    /// Due date relative to today; negative is overdue.
    due_in_days: i64,
}

const TASKS: [SeedTask; 10] = [
    SeedTask {
        title: "Design new landing page",
        description: "Create mockups for the new homepage with updated branding",
        status: TaskStatus::InProgress,
        priority: TaskPriority::High,
        project: 0,
        assignee: 0,
        creator: 0,
        due_in_days: 5,
    },
    SeedTask {
        title: "Implement authentication",
        description: "Set up user login and registration flow",
        status: TaskStatus::Review,
        priority: TaskPriority::High,
        project: 0,
        assignee: 1,
        creator: 0,
        due_in_days: 3,
    },
    SeedTask {
        title: "Write documentation",
        description: "API documentation for new endpoints",
        status: TaskStatus::Todo,
        priority: TaskPriority::Medium,
        project: 0,
        assignee: 2,
        creator: 0,
        due_in_days: 10,
    },
    SeedTask {
        title: "Fix mobile responsiveness",
        description: "Address layout issues on mobile devices",
        status: TaskStatus::Done,
        priority: TaskPriority::High,
        project: 0,
        assignee: 0,
        creator: 0,
        due_in_days: -4,
    },
    SeedTask {
        title: "Setup analytics",
        description: "Integrate Google Analytics and event tracking",
        status: TaskStatus::InProgress,
        priority: TaskPriority::Medium,
        project: 0,
        assignee: 3,
        creator: 0,
        due_in_days: 7,
    },
    SeedTask {
        title: "Design app icon",
        description: "Create icon assets for iOS and Android",
        status: TaskStatus::Todo,
        priority: TaskPriority::Low,
        project: 1,
        assignee: 5,
        creator: 1,
        due_in_days: 15,
    },
    SeedTask {
        title: "Database schema",
        description: "Design and implement database structure",
        status: TaskStatus::Done,
        priority: TaskPriority::High,
        project: 1,
        assignee: 1,
        creator: 1,
        due_in_days: -7,
    },
    SeedTask {
        title: "User testing",
        description: "Conduct usability testing with beta users",
        status: TaskStatus::Review,
        priority: TaskPriority::Medium,
        project: 1,
        assignee: 6,
        creator: 1,
        due_in_days: 9,
    },
    SeedTask {
        title: "Social media assets",
        description: "Create graphics for campaign launch",
        status: TaskStatus::InProgress,
        priority: TaskPriority::High,
        project: 2,
        assignee: 9,
        creator: 0,
        due_in_days: 4,
    },
    SeedTask {
        title: "Email campaign setup",
        description: "Configure email sequences in marketing platform",
        status: TaskStatus::Todo,
        priority: TaskPriority::Medium,
        project: 2,
        assignee: 10,
        creator: 0,
        due_in_days: 11,
    },
];

/// What a seed run wrote, for the response and the change feed.
pub struct SeedOutcome {
    pub stats: SeedStats,
    pub changes: Vec<ChangeEvent>,
}

fn change(table: ChangeTable, id: &str) -> ChangeEvent {
    ChangeEvent {
        table,
        op: ChangeOp::Insert,
        id: id.to_string(),
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Insert the demo data set in one transaction. Existing demo accounts
/// (matched by email) are reused; teams, projects and tasks are always new.
///
/// `password` is the derived key for [`DEMO_PASSWORD`], shared by every
/// account this run creates.
pub fn run(conn: &Connection, password: &PasswordHash) -> rusqlite::Result<SeedOutcome> {
    let tx = conn.unchecked_transaction()?;
    let mut changes = Vec::new();

    let mut user_ids = Vec::with_capacity(USERS.len());
    for (email, full_name) in USERS {
        let existing: Option<String> =
            storage::query_optional(&tx, users::get_by_email(email), |row| row.get(0))?;
        let id = match existing {
            Some(id) => id,
            None => {
                let id = new_id();
                storage::execute(
                    &tx,
                    users::insert(
                        &id,
                        email,
                        full_name,
                        &password.hash,
                        &password.salt,
                        Role::Employee,
                    ),
                )?;
                changes.push(change(ChangeTable::Users, &id));
                id
            }
        };
        user_ids.push(id);
    }

    let mut team_ids = Vec::with_capacity(TEAMS.len());
    for team in &TEAMS {
        let team_id = new_id();
        storage::execute(
            &tx,
            teams::insert(&team_id, team.name, Some(team.description), &user_ids[0]),
        )?;
        changes.push(change(ChangeTable::Teams, &team_id));

        for &member in &team.members {
            let member_id = new_id();
            storage::execute(
                &tx,
                teams::member_insert(&member_id, &team_id, &user_ids[member], &user_ids[0]),
            )?;
            changes.push(change(ChangeTable::TeamMembers, &member_id));
        }
        team_ids.push(team_id);
    }

    let mut project_ids = Vec::with_capacity(PROJECTS.len());
    for project in &PROJECTS {
        let id = new_id();
        storage::execute(
            &tx,
            projects::insert(&projects::NewProject {
                id: &id,
                name: project.name,
                description: Some(project.description),
                team_id: Some(team_ids[project.team].as_str()),
                color: project.color,
                deadline: None,
                created_by: &user_ids[project.creator],
            }),
        )?;
        changes.push(change(ChangeTable::Projects, &id));
        project_ids.push(id);
    }

    let today = Utc::now().date_naive();
    for task in &TASKS {
        let id = new_id();
        let due = (today + Duration::days(task.due_in_days))
            .format("%Y-%m-%d")
            .to_string();
        storage::execute(
            &tx,
            tasks::insert(&tasks::NewTask {
                id: &id,
                title: task.title,
                description: Some(task.description),
                status: task.status,
                priority: task.priority,
                assignee_id: Some(user_ids[task.assignee].as_str()),
                project_id: &project_ids[task.project],
                due_date: Some(due.as_str()),
                created_by: &user_ids[task.creator],
            }),
        )?;
        changes.push(change(ChangeTable::Tasks, &id));
    }

    tx.commit()?;

    Ok(SeedOutcome {
        stats: SeedStats {
            users: user_ids.len() as u32,
            teams: team_ids.len() as u32,
            projects: project_ids.len() as u32,
            tasks: TASKS.len() as u32,
        },
        changes,
    })
}
