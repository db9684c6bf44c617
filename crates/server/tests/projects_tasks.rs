mod common;

use common::{spawn, status_of, TestServer, TestUser};
use taskboard_api::{
    CreateProjectRequest, CreateTaskRequest, CreateTeamRequest, ProjectResponse, Role,
    TaskListQuery, TaskPriority, TaskStats, TaskStatus, UpdateProjectRequest, UpdateTaskRequest,
};

async fn project(owner: &TestUser, name: &str) -> ProjectResponse {
    owner
        .api
        .create_project(&CreateProjectRequest {
            name: name.into(),
            description: Some("Complete overhaul of company website".into()),
            ..Default::default()
        })
        .await
        .unwrap()
}

fn task(project_id: &str, title: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.into(),
        project_id: project_id.into(),
        ..Default::default()
    }
}

async fn setup() -> (TestServer, TestUser, TestUser) {
    let server = spawn().await;
    let manager = server.user("Manager", Role::Manager);
    let employee = server.user("Employee", Role::Employee);
    (server, manager, employee)
}

#[tokio::test]
async fn project_crud_and_permissions() {
    let (_server, manager, employee) = setup().await;

    let denied = employee
        .api
        .create_project(&CreateProjectRequest {
            name: "Nope".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(status_of(denied), 403);

    let created = project(&manager, "Website Redesign").await;
    assert_eq!(created.color, "hsl(215, 85%, 55%)");
    assert_eq!(created.team_id, None);
    assert_eq!(created.created_by.as_deref(), Some(manager.id.as_str()));

    let unknown_team = manager
        .api
        .create_project(&CreateProjectRequest {
            name: "Orphan".into(),
            team_id: Some("missing".into()),
            ..Default::default()
        })
        .await;
    assert_eq!(status_of(unknown_team), 404);

    let team = manager
        .api
        .create_team(&CreateTeamRequest {
            name: "Development Team".into(),
            description: None,
        })
        .await
        .unwrap();
    let updated = manager
        .api
        .update_project(
            &created.id,
            &UpdateProjectRequest {
                team_id: Some(Some(team.id.clone())),
                deadline: Some(Some("2030-06-30".into())),
                color: Some("hsl(145, 65%, 45%)".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.team_id.as_deref(), Some(team.id.as_str()));
    assert_eq!(updated.deadline.as_deref(), Some("2030-06-30"));
    assert_eq!(updated.name, "Website Redesign");

    let by_team = employee.api.list_projects(Some(team.id.as_str())).await.unwrap();
    assert_eq!(by_team.projects.len(), 1);

    let cleared = manager
        .api
        .update_project(
            &created.id,
            &UpdateProjectRequest {
                team_id: Some(None),
                deadline: Some(None),
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.team_id, None);
    assert_eq!(cleared.deadline, None);
    assert_eq!(cleared.description, None);
    assert!(employee
        .api
        .list_projects(Some(team.id.as_str()))
        .await
        .unwrap()
        .projects
        .is_empty());

    let rename = UpdateProjectRequest {
        name: Some("x".into()),
        ..Default::default()
    };
    assert_eq!(status_of(employee.api.update_project(&created.id, &rename).await), 403);
    assert_eq!(status_of(manager.api.update_project("missing", &rename).await), 404);
}

#[tokio::test]
async fn task_defaults_and_validation() {
    let (server, manager, employee) = setup().await;
    let proj = project(&manager, "Mobile App").await;

    let created = employee.api.create_task(&task(&proj.id, "  Design app icon ")).await.unwrap();
    assert_eq!(created.title, "Design app icon");
    assert_eq!(created.status, TaskStatus::Todo);
    assert_eq!(created.priority, TaskPriority::Medium);
    assert_eq!(created.created_by.as_deref(), Some(employee.id.as_str()));
    assert!(created.assignee.is_none());

    assert_eq!(
        status_of(employee.api.create_task(&task("missing", "x")).await),
        404
    );
    let bad_assignee = CreateTaskRequest {
        assignee_id: Some("missing".into()),
        ..task(&proj.id, "x")
    };
    assert_eq!(status_of(employee.api.create_task(&bad_assignee).await), 404);
    assert_eq!(
        status_of(employee.api.create_task(&task(&proj.id, "")).await),
        400
    );
    assert_eq!(
        status_of(employee.api.create_task(&task(&proj.id, &"x".repeat(201))).await),
        400
    );

    // Unknown status strings never reach the handler.
    let raw = reqwest::Client::new()
        .post(format!("{}/api/tasks", server.base_url))
        .bearer_auth(employee.api.auth_token().unwrap())
        .json(&serde_json::json!({
            "title": "Bad status",
            "project_id": proj.id,
            "status": "blocked",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(raw.status().as_u16(), 400);
    let body: serde_json::Value = raw.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn board_moves_and_reassignment() {
    let (server, manager, employee) = setup().await;
    let mia = server.user("Mia", Role::Employee);
    let proj = project(&manager, "Marketing Campaign").await;
    let other = project(&manager, "Website Redesign").await;

    let created = employee
        .api
        .create_task(&CreateTaskRequest {
            assignee_id: Some(mia.id.clone()),
            due_date: Some("2030-01-15".into()),
            priority: Some(TaskPriority::High),
            ..task(&proj.id, "Email campaign setup")
        })
        .await
        .unwrap();
    let assignee = created.assignee.as_ref().unwrap();
    assert_eq!(assignee.id, mia.id);
    assert_eq!(assignee.full_name, "Mia");

    let moved = mia
        .api
        .update_task(
            &created.id,
            &UpdateTaskRequest {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.status, TaskStatus::InProgress);
    assert_eq!(moved.priority, TaskPriority::High, "untouched fields survive");

    let cleared = mia
        .api
        .update_task(
            &created.id,
            &UpdateTaskRequest {
                assignee_id: Some(None),
                due_date: Some(None),
                project_id: Some(other.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.assignee_id, None);
    assert!(cleared.assignee.is_none());
    assert_eq!(cleared.due_date, None);
    assert_eq!(cleared.project_id, other.id);

    let bad_date = UpdateTaskRequest {
        due_date: Some(Some("next tuesday".into())),
        ..Default::default()
    };
    assert_eq!(status_of(mia.api.update_task(&created.id, &bad_date).await), 400);
    assert_eq!(
        status_of(
            mia.api
                .update_task(
                    &created.id,
                    &UpdateTaskRequest {
                        project_id: Some("missing".into()),
                        ..Default::default()
                    }
                )
                .await
        ),
        404
    );
    assert_eq!(status_of(mia.api.get_task("missing").await), 404);
}

#[tokio::test]
async fn listing_filters_and_limits() {
    let (server, manager, employee) = setup().await;
    let olivia = server.user("Olivia", Role::Employee);
    let a = project(&manager, "A").await;
    let b = project(&manager, "B").await;

    for i in 0..4 {
        employee.api.create_task(&task(&a.id, &format!("a{i}"))).await.unwrap();
    }
    employee
        .api
        .create_task(&CreateTaskRequest {
            status: Some(TaskStatus::Done),
            assignee_id: Some(olivia.id.clone()),
            ..task(&b.id, "b-done")
        })
        .await
        .unwrap();

    let all = employee.api.list_tasks(&TaskListQuery::default()).await.unwrap().tasks;
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].title, "b-done", "newest first");

    let only_a = TaskListQuery {
        project_id: Some(a.id.clone()),
        limit: Some(2),
        ..Default::default()
    };
    let page = employee.api.list_tasks(&only_a).await.unwrap().tasks;
    assert_eq!(
        page.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
        ["a3", "a2"]
    );

    let done_for_olivia = TaskListQuery {
        status: Some(TaskStatus::Done),
        assignee_id: Some(olivia.id.clone()),
        ..Default::default()
    };
    let done = employee.api.list_tasks(&done_for_olivia).await.unwrap().tasks;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].project_id, b.id);

    // Out-of-range limits are clamped rather than rejected.
    let zero = TaskListQuery {
        limit: Some(0),
        ..Default::default()
    };
    assert_eq!(employee.api.list_tasks(&zero).await.unwrap().tasks.len(), 1);
}

#[tokio::test]
async fn task_deletion_rights() {
    let (server, manager, employee) = setup().await;
    let lead = server.user("Lead", Role::TeamLead);
    let peer = server.user("Peer", Role::Employee);
    let proj = project(&manager, "Mobile App").await;

    let own = employee.api.create_task(&task(&proj.id, "mine")).await.unwrap();
    let theirs = employee.api.create_task(&task(&proj.id, "theirs")).await.unwrap();

    assert_eq!(status_of(peer.api.delete_task(&own.id).await), 403);
    employee.api.delete_task(&own.id).await.unwrap();
    lead.api.delete_task(&theirs.id).await.unwrap();
    assert_eq!(status_of(lead.api.delete_task(&theirs.id).await), 404);
}

#[tokio::test]
async fn project_detail_stats_and_cascade() {
    let (_server, manager, employee) = setup().await;
    let proj = project(&manager, "Website Redesign").await;

    let empty = employee.api.project_stats(&proj.id).await.unwrap();
    assert_eq!(empty, TaskStats::default());

    for (title, status) in [
        ("t1", TaskStatus::Done),
        ("t2", TaskStatus::Done),
        ("t3", TaskStatus::Review),
    ] {
        employee
            .api
            .create_task(&CreateTaskRequest {
                status: Some(status),
                ..task(&proj.id, title)
            })
            .await
            .unwrap();
    }

    let detail = employee.api.get_project(&proj.id).await.unwrap();
    assert_eq!(
        detail.stats,
        TaskStats {
            total: 3,
            todo: 0,
            in_progress: 0,
            review: 1,
            done: 2,
            completion_rate: 67,
        }
    );
    assert!(detail.members.is_empty());

    assert_eq!(status_of(employee.api.delete_project(&proj.id).await), 403);
    manager.api.delete_project(&proj.id).await.unwrap();
    assert_eq!(status_of(employee.api.get_project(&proj.id).await), 404);
    assert_eq!(status_of(employee.api.project_stats(&proj.id).await), 404);
    let remaining = TaskListQuery {
        project_id: Some(proj.id.clone()),
        ..Default::default()
    };
    assert!(employee.api.list_tasks(&remaining).await.unwrap().tasks.is_empty());
}

#[tokio::test]
async fn dashboard_and_search() {
    let (server, manager, employee) = setup().await;
    let proj = project(&manager, "Website Redesign").await;
    manager
        .api
        .create_team(&CreateTeamRequest {
            name: "Design Team".into(),
            description: None,
        })
        .await
        .unwrap();

    for (title, status) in [
        ("Design new landing page", TaskStatus::InProgress),
        ("Fix mobile responsiveness", TaskStatus::Done),
        ("Write documentation", TaskStatus::Todo),
    ] {
        manager
            .api
            .create_task(&CreateTaskRequest {
                status: Some(status),
                assignee_id: Some(employee.id.clone()),
                ..task(&proj.id, title)
            })
            .await
            .unwrap();
    }

    let dash = employee.api.dashboard().await.unwrap();
    assert_eq!(dash.projects, 1);
    assert_eq!(dash.teams, 1);
    assert_eq!(dash.users, 2);
    assert_eq!(dash.recent.total, 3);
    assert_eq!(dash.recent.completion_rate, 33);
    assert_eq!(dash.my_open_tasks, 2);
    assert_eq!(server.user("Idle", Role::Employee).api.dashboard().await.unwrap().my_open_tasks, 0);

    let hits = employee.api.search("DESIGN").await.unwrap();
    assert_eq!(hits.tasks.len(), 1);
    assert_eq!(hits.tasks[0].title, "Design new landing page");
    assert_eq!(hits.projects.len(), 1, "matches 'Website Redesign'");

    let people = employee.api.search("manag").await.unwrap();
    assert_eq!(people.users.len(), 1);
    assert_eq!(people.users[0].id, manager.id);

    let wildcard = employee.api.search("%").await.unwrap();
    assert!(wildcard.tasks.is_empty() && wildcard.projects.is_empty());

    let blank = employee.api.search("   ").await.unwrap();
    assert!(blank.tasks.is_empty() && blank.projects.is_empty() && blank.users.is_empty());

    for i in 0..7 {
        manager.api.create_task(&task(&proj.id, &format!("Bulk item {i}"))).await.unwrap();
    }
    assert_eq!(employee.api.search("bulk").await.unwrap().tasks.len(), 5);

    let elodie = server.user("Élodie", Role::Employee);
    for query in ["Élodie", "ÉLODIE"] {
        let found = employee.api.search(query).await.unwrap().users;
        assert_eq!(found.len(), 1, "query {query:?}");
        assert_eq!(found[0].id, elodie.id);
    }
}
