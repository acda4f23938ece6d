mod common;

use axum::http::StatusCode;
use forma::web::UserRole;
use serde_json::json;

use crate::common::{
    Action, Flow, add_domain, add_personne, add_team, create_formation_action, detail_item,
    full_marks_answers, open_formation_action, progress_action, quiz_path, sample_formation,
    setup_server, setup_test_db, step_action,
};

fn reset_action(user: &str) -> Action {
    Action::new("reset", "POST", "")
        .as_user(user)
        .with_dyn_path(|ctx| format!("/api/v1/formations/{}/reset", ctx.field("formation", "id")))
}

fn reset_all_action(user: &str) -> Action {
    Action::new("reset_all", "POST", "")
        .as_user(user)
        .with_dyn_path(|ctx| format!("/api/v1/formations/{}/reset-all", ctx.field("formation", "id")))
}

fn submit_action(user: &str) -> Action {
    Action::new("submit", "POST", "")
        .as_user(user)
        .with_dyn_path(|ctx| quiz_path(ctx, "submit"))
        .with_dyn_body(full_marks_answers)
}

#[tokio::test]
async fn reset_archives_quiz_attempts_and_starts_over() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    let server = setup_server(&db).await;

    Flow::new()
        .step(create_formation_action("admin", sample_formation(None)))
        .step(open_formation_action("M1"))
        .step(step_action("M1", "overview"))
        .step(
            Action::new("complete_module", "POST", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/modules/{}/complete", detail_item(ctx, "modules", 0))),
        )
        .step(submit_action("M1"))
        .step(reset_action("M1").assert_body(|detail| {
            assert_eq!(detail["progress"], 0);
            assert_eq!(detail["progress_status"], "new");
            assert_eq!(detail["tabsCompleted"]["overview"], false);
            assert_eq!(detail["modules"][0]["completed"], false);
            assert_eq!(detail["quiz"]["completed"], false);
            assert!(detail["last_accessed"].is_null());
        }))
        .step(progress_action("M1").assert_body(|progress| {
            assert_eq!(progress["progress"], 0);
            assert_eq!(progress["time_spent_minutes"], 0);
            assert!(progress["quiz_result"].is_null());
            let history = progress["quiz_history"].as_array().unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0]["score"], 3);
        }))
        .step(
            Action::new("results_gone", "GET", "")
                .as_user("M1")
                .with_dyn_path(|ctx| quiz_path(ctx, "results"))
                .with_expect(StatusCode::NOT_FOUND),
        )
        // a second round adds to the history instead of replacing it
        .step(submit_action("M1"))
        .step(reset_action("M1"))
        .step(progress_action("M1").assert_body(|progress| {
            assert_eq!(progress["quiz_history"].as_array().unwrap().len(), 2);
        }))
        .run(&server)
        .await;
}

#[tokio::test]
async fn reset_refreshes_formations_sharing_a_module() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    let server = setup_server(&db).await;

    let list = |name, expected: i64| {
        Action::new(name, "GET", "/api/v1/formations")
            .as_user("M1")
            .assert_body(move |page| {
                let shared = page["items"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|f| f["title"] == "Shared")
                    .expect("shared formation listed");
                assert_eq!(shared["progress"], expected);
            })
    };

    Flow::new()
        .step(
            create_formation_action("admin", json!({
                "title": "Origin",
                "modules": [{ "title": "Common ground" }]
            }))
            .with_save_as("origin"),
        )
        .step(
            Action::new("open_origin", "GET", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/formations/{}", ctx.field("origin", "id")))
                .with_save_as("detail"),
        )
        .step(
            Action::new("create_shared", "POST", "/api/v1/formations")
                .as_user("admin")
                .with_dyn_body(|ctx| {
                    json!({
                        "title": "Shared",
                        "modules": [{ "id": detail_item(ctx, "modules", 0), "title": "Common ground" }]
                    })
                })
                .with_expect(StatusCode::CREATED)
                .with_save_as("formation"),
        )
        .step(step_action("M1", "overview"))
        .step(list("before", 50))
        .step(
            Action::new("complete_module", "POST", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/modules/{}/complete", detail_item(ctx, "modules", 0))),
        )
        .step(list("completed", 100))
        .step(
            Action::new("reset_origin", "POST", "")
                .as_user("M1")
                .with_dyn_path(|ctx| format!("/api/v1/formations/{}/reset", ctx.field("origin", "id"))),
        )
        .step(list("after_reset", 50))
        .run(&server)
        .await;
}

#[tokio::test]
async fn reset_all_counts_users_without_progress_as_skipped() {
    let Some(db) = setup_test_db().await else { return };
    add_personne(&db, "M1", UserRole::Collaborateur).await;
    add_personne(&db, "M2", UserRole::Collaborateur).await;
    add_personne(&db, "M3", UserRole::Collaborateur).await;
    add_personne(&db, "LEAD", UserRole::Udl).await;
    let team = add_team(&db, "Support", &["M1", "M2", "M3"]).await;
    let domain = add_domain(&db, "Customer care", &[team]).await;
    let server = setup_server(&db).await;

    Flow::new()
        .step(create_formation_action("admin", sample_formation(Some(domain))))
        .step(open_formation_action("M1"))
        .step(step_action("M1", "overview"))
        .step(submit_action("M1"))
        .step(step_action("M2", "overview"))
        .step(reset_all_action("M1").with_expect(StatusCode::FORBIDDEN))
        .step(reset_all_action("LEAD").assert_body(|summary| {
            assert_eq!(summary, &json!({ "reset": 2, "skipped": 1, "failed": 0 }));
        }))
        .step(progress_action("M1").assert_body(|progress| {
            assert_eq!(progress["progress"], 0);
            assert_eq!(progress["quiz_history"].as_array().unwrap().len(), 1);
        }))
        .step(progress_action("M2").assert_body(|progress| {
            assert_eq!(progress["tabsCompleted"]["overview"], false);
        }))
        .run(&server)
        .await;
}
