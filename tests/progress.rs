mod common;

use axum::http::StatusCode;
use forma::web::UserRole;
use serde_json::json;

use crate::common::{
    Action, Flow, add_personne, create_formation_action, detail_item, full_marks_answers,
    open_formation_action, progress_action, quiz_path, sample_formation, setup_server,
    setup_test_db, step_action,
};

#[tokio::test]
async fn progress_follows_completed_items() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    let server = setup_server(&db).await;

    Flow::new()
        .step(create_formation_action("admin", sample_formation(None)))
        .step(open_formation_action("M1").assert_body(|detail| {
            assert_eq!(detail["progress"], 0);
            assert_eq!(detail["progress_status"], "new");
            assert_eq!(
                detail["tabsCompleted"],
                json!({ "overview": false, "modules": false, "resources": false, "quiz": false })
            );
            assert_eq!(detail["total_estimated_time"], "00:50:00");
            assert!(detail["last_accessed"].is_string());
            // answer keys never leave the server
            assert!(detail["quiz"]["questions"][0]["options"][0].get("is_correct").is_none());
        }))
        .step(step_action("M1", "overview"))
        .step(
            Action::new("complete_first_module", "POST", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/modules/{}/complete", detail_item(ctx, "modules", 0))),
        )
        .step(
            Action::new("complete_second_module", "POST", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/modules/{}/complete", detail_item(ctx, "modules", 1))),
        )
        .step(
            Action::new("read_resource", "POST", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/resources/{}/read", detail_item(ctx, "resources", 0))),
        )
        .step(progress_action("M1").assert_body(|progress| {
            assert_eq!(progress["progress"], 80);
            assert_eq!(progress["status"], "in_progress");
            assert_eq!(
                progress["tabsCompleted"],
                json!({ "overview": true, "modules": true, "resources": true, "quiz": false })
            );
            assert_eq!(progress["chapters"], json!({ "completed": 2, "total": 2 }));
            assert_eq!(progress["time_spent_minutes"], 1);
            assert!(progress["quiz_result"].is_null());
        }))
        // recomputing without new completions changes nothing
        .step(progress_action("M1").assert_body(|progress| {
            assert_eq!(progress["progress"], 80);
            assert_eq!(progress["status"], "in_progress");
        }))
        .step(
            Action::new("submit_quiz", "POST", "")
                .as_user("M1")
                .with_dyn_path(|ctx| quiz_path(ctx, "submit"))
                .with_dyn_body(full_marks_answers),
        )
        .step(progress_action("M1").assert_body(|progress| {
            assert_eq!(progress["progress"], 100);
            assert_eq!(progress["status"], "done");
            assert_eq!(progress["tabsCompleted"]["quiz"], true);
            assert_eq!(progress["quiz_result"]["percentage"], 100);
        }))
        .run(&server)
        .await;
}

#[tokio::test]
async fn empty_formation_only_needs_the_overview() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    let server = setup_server(&db).await;

    Flow::new()
        .step(create_formation_action("admin", json!({ "title": "Empty" })))
        .step(progress_action("M1").assert_body(|progress| {
            assert_eq!(progress["progress"], 0);
            assert_eq!(progress["has_quiz"], false);
            // tabs without content are left out
            assert_eq!(progress["tabsCompleted"], json!({ "overview": false }));
        }))
        .step(step_action("M1", "overview").assert_body(|progress| {
            assert_eq!(progress["progress"], 100);
            assert_eq!(progress["status"], "done");
        }))
        .step(
            step_action("M1", "chapters")
                .with_expect(StatusCode::BAD_REQUEST)
                .assert_body(|error| {
                    assert!(error["message"].as_str().unwrap().contains("unknown step"));
                }),
        )
        .run(&server)
        .await;
}

#[tokio::test]
async fn formation_listing_shows_the_callers_progress() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    let server = setup_server(&db).await;

    Flow::new()
        .step(create_formation_action("admin", json!({ "title": "Alpha" })))
        .step(create_formation_action("admin", json!({ "title": "Beta" })))
        .step(step_action("M1", "overview"))
        .step(
            Action::new("list", "GET", "/api/v1/formations")
                .as_user("M1")
                .with_param("limit", "10")
                .assert_body(|page| {
                    assert_eq!(page["total"], 2);
                    let items = page["items"].as_array().unwrap();
                    assert_eq!(items[0]["title"], "Alpha");
                    assert_eq!(items[0]["progress"], 0);
                    assert_eq!(items[0]["progress_status"], "new");
                    assert_eq!(items[1]["title"], "Beta");
                    assert_eq!(items[1]["progress"], 100);
                }),
        )
        .step(
            Action::new("list_paged", "GET", "/api/v1/formations")
                .as_user("M1")
                .with_param("limit", "1")
                .with_param("offset", "1")
                .assert_body(|page| {
                    assert_eq!(page["items"].as_array().unwrap().len(), 1);
                    assert_eq!(page["items"][0]["title"], "Beta");
                }),
        )
        .run(&server)
        .await;
}

#[tokio::test]
async fn only_managers_read_other_users_progress() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    add_personne(&db, "M2", UserRole::Collaborateur).await;
    add_personne(&db, "L1", UserRole::Cl).await;
    let server = setup_server(&db).await;

    Flow::new()
        .step(create_formation_action("admin", sample_formation(None)))
        .step(step_action("M2", "overview"))
        .step(
            progress_action("M1")
                .with_param("user", "M2")
                .with_expect(StatusCode::FORBIDDEN),
        )
        // asking for yourself is always fine
        .step(progress_action("M1").with_param("user", "M1"))
        .step(progress_action("L1").with_param("user", "M2").assert_body(|progress| {
            assert_eq!(progress["matricule"], "M2");
            assert_eq!(progress["tabsCompleted"]["overview"], true);
            assert_eq!(progress["progress"], 20);
        }))
        .step(
            progress_action("L1")
                .with_param("user", "nobody")
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&server)
        .await;
}

#[tokio::test]
async fn editing_requires_a_manager_and_a_session() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    let server = setup_server(&db).await;

    Flow::new()
        .step(Action::new("anonymous_list", "GET", "/api/v1/formations").with_expect(StatusCode::UNAUTHORIZED))
        .step(
            Action::new("unknown_user", "GET", "/api/v1/formations")
                .as_user("ghost")
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        .step(
            create_formation_action("M1", sample_formation(None)).with_expect(StatusCode::FORBIDDEN),
        )
        .step(create_formation_action("admin", sample_formation(None)).assert_body(|formation| {
            assert_eq!(formation["created_by"], "admin");
            assert!(formation["quiz_id"].is_string());
        }))
        .step(
            Action::new("collaborator_delete", "DELETE", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/formations/{}", ctx.field("formation", "id")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("admin_delete", "DELETE", "")
                .as_user("admin")
                .with_dyn_path(|ctx| format!("/api/v1/formations/{}", ctx.field("formation", "id"))),
        )
        .step(
            Action::new("deleted_is_gone", "GET", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/formations/{}", ctx.field("formation", "id")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&server)
        .await;
}
