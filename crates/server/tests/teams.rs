mod common;

use common::{spawn, status_of};
use taskboard_api::{CreateProjectRequest, CreateTeamRequest, Role, UpdateTeamRequest};

fn team(name: &str) -> CreateTeamRequest {
    CreateTeamRequest {
        name: name.into(),
        description: Some("UI/UX and Visual Design".into()),
    }
}

#[tokio::test]
async fn team_management_follows_roles() {
    let server = spawn().await;
    let admin = server.user("Admin", Role::Admin);
    let manager = server.user("Manager", Role::Manager);
    let lead = server.user("Lead", Role::TeamLead);
    let employee = server.user("Employee", Role::Employee);

    assert_eq!(status_of(employee.api.create_team(&team("A")).await), 403);
    assert_eq!(status_of(lead.api.create_team(&team("B")).await), 403);
    manager.api.create_team(&team("Design Team")).await.unwrap();
    let created = admin.api.create_team(&team("Marketing Team")).await.unwrap();
    assert_eq!(created.created_by.as_deref(), Some(admin.id.as_str()));
    assert_eq!(created.member_count, 0);

    // Everyone can read.
    let listed = employee.api.list_teams().await.unwrap().teams;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "Marketing Team", "newest first");

    // Team leads manage membership but not the team itself.
    lead.api.add_member(&created.id, &employee.id).await.unwrap();
    assert_eq!(
        status_of(employee.api.add_member(&created.id, &lead.id).await),
        403
    );
    let rename = UpdateTeamRequest {
        name: Some("Growth".into()),
        ..Default::default()
    };
    assert_eq!(status_of(lead.api.update_team(&created.id, &rename).await), 403);
    assert_eq!(
        manager.api.update_team(&created.id, &rename).await.unwrap().name,
        "Growth"
    );
    assert_eq!(status_of(lead.api.delete_team(&created.id).await), 403);
}

#[tokio::test]
async fn membership_lifecycle() {
    let server = spawn().await;
    let lead = server.user("Lead", Role::TeamLead);
    let manager = server.user("Manager", Role::Manager);
    let mike = server.user("Mike", Role::Employee);

    let team = manager.api.create_team(&team("Development Team")).await.unwrap();

    let member = lead.api.add_member(&team.id, &mike.id).await.unwrap();
    assert_eq!(member.team_id, team.id);
    assert_eq!(member.user_id, mike.id);
    assert_eq!(member.full_name, "Mike");
    assert_eq!(member.added_by.as_deref(), Some(lead.id.as_str()));

    let duplicate = lead.api.add_member(&team.id, &mike.id).await;
    let err = duplicate.unwrap_err();
    assert_eq!(
        taskboard_api_client::error_status(&err).map(|s| s.as_u16()),
        Some(409)
    );
    assert!(err
        .to_string()
        .contains("user is already a member of this team"));

    assert_eq!(status_of(lead.api.add_member(&team.id, "no-such-user").await), 404);
    assert_eq!(status_of(lead.api.add_member("no-such-team", &mike.id).await), 404);

    let detail = mike.api.get_team(&team.id).await.unwrap();
    assert_eq!(detail.team.member_count, 1);
    assert_eq!(detail.members.len(), 1);
    assert_eq!(mike.api.list_members(&team.id).await.unwrap().members, detail.members);

    lead.api.remove_member(&team.id, &member.id).await.unwrap();
    assert_eq!(status_of(lead.api.remove_member(&team.id, &member.id).await), 404);
    assert!(mike.api.list_members(&team.id).await.unwrap().members.is_empty());
    assert_eq!(status_of(mike.api.list_members("missing").await), 404);
}

#[tokio::test]
async fn deleting_a_team_detaches_projects_and_drops_members() {
    let server = spawn().await;
    let manager = server.user("Manager", Role::Manager);
    let sophia = server.user("Sophia", Role::Employee);

    let team = manager.api.create_team(&team("Design Team")).await.unwrap();
    manager.api.add_member(&team.id, &sophia.id).await.unwrap();
    let project = manager
        .api
        .create_project(&CreateProjectRequest {
            name: "Website Redesign".into(),
            team_id: Some(team.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();

    manager.api.delete_team(&team.id).await.unwrap();
    assert_eq!(status_of(manager.api.get_team(&team.id).await), 404);
    assert_eq!(status_of(manager.api.delete_team(&team.id).await), 404);

    let detached = manager.api.get_project(&project.id).await.unwrap();
    assert_eq!(detached.project.team_id, None);
    assert!(detached.members.is_empty());
}

#[tokio::test]
async fn team_description_can_be_cleared() {
    let server = spawn().await;
    let admin = server.user("Admin", Role::Admin);
    let created = admin.api.create_team(&team("Ops")).await.unwrap();
    assert!(created.description.is_some());

    let updated = admin
        .api
        .update_team(
            &created.id,
            &UpdateTeamRequest {
                name: None,
                description: Some(None),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Ops");
    assert_eq!(updated.description, None);

    assert_eq!(
        status_of(admin.api.create_team(&team("   ")).await),
        400,
        "blank names are rejected"
    );
}

#[tokio::test]
async fn admin_guards_on_users() {
    let server = spawn().await;
    let admin = server.user("Admin", Role::Admin);
    let manager = server.user("Manager", Role::Manager);
    let isabella = server.user("Isabella", Role::Employee);

    assert_eq!(status_of(manager.api.update_role(&isabella.id, Role::Admin).await), 403);
    assert_eq!(status_of(admin.api.update_role(&admin.id, Role::Employee).await), 409);
    assert_eq!(status_of(admin.api.delete_user(&admin.id).await), 409);
    assert_eq!(status_of(admin.api.update_role("missing", Role::Manager).await), 404);

    let promoted = admin.api.update_role(&isabella.id, Role::TeamLead).await.unwrap();
    assert_eq!(promoted.role, Role::TeamLead);

    // Profiles: self or admin only.
    let patch = taskboard_api::UpdateProfileRequest {
        full_name: Some("Isabella Hall".into()),
        avatar_url: None,
    };
    assert_eq!(
        status_of(manager.api.update_user_profile(&isabella.id, &patch).await),
        403
    );
    assert_eq!(
        admin
            .api
            .update_user_profile(&isabella.id, &patch)
            .await
            .unwrap()
            .full_name,
        "Isabella Hall"
    );

    let users = manager.api.list_users().await.unwrap().users;
    let names: Vec<&str> = users.iter().map(|u| u.full_name.as_str()).collect();
    assert_eq!(names, ["Admin", "Isabella Hall", "Manager"]);

    assert_eq!(status_of(manager.api.delete_user(&isabella.id).await), 403);
    admin.api.delete_user(&isabella.id).await.unwrap();
    assert_eq!(status_of(admin.api.delete_user(&isabella.id).await), 404);
}
