mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;

use flowdesk_api::db::store::NotificationStore;
use flowdesk_api::gateway::events::EventName;
use flowdesk_api::models::notification::{NewNotification, NotificationKind};
use flowdesk_api::AppState;

async fn seed(state: &AppState, user_id: &str, message: &str) -> i64 {
    state
        .delivery
        .notify(
            NewNotification {
                user_id: user_id.to_string(),
                message: message.to_string(),
                link: None,
                kind: NotificationKind::Incident,
            },
            EventName::INCIDENT_CREATED,
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn list_returns_only_own_notifications_newest_first() {
    let (server, state) = common::test_server().await;
    let bea = common::token_for("usr_bea", "Bea");

    seed(&state, "usr_bea", "first").await;
    seed(&state, "usr_ana", "not yours").await;
    seed(&state, "usr_bea", "second").await;

    let resp = server
        .get("/api/v1/notifications")
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    resp.assert_status_ok();
    let list: Vec<serde_json::Value> = resp.json();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["message"], "second");
    assert_eq!(list[1]["message"], "first");
    assert_eq!(list[0]["read"], false);
    assert_eq!(list[0]["kind"], "incident");
}

#[tokio::test]
async fn read_all_leaves_nothing_unread() {
    let (server, state) = common::test_server().await;
    let bea = common::token_for("usr_bea", "Bea");

    seed(&state, "usr_bea", "one").await;
    seed(&state, "usr_bea", "two").await;

    let resp = server
        .put("/api/v1/notifications/read-all")
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["updated"], 2);

    let list: Vec<serde_json::Value> = server
        .get("/api/v1/notifications")
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await
        .json();
    assert!(list.iter().all(|n| n["read"] == true));

    // Nothing left to change; still succeeds.
    let again = server
        .put("/api/v1/notifications/read-all")
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    again.assert_status_ok();
    assert_eq!(again.json::<serde_json::Value>()["updated"], 0);
}

#[tokio::test]
async fn deleting_someone_elses_notification_is_not_found() {
    let (server, state) = common::test_server().await;
    let ana = common::token_for("usr_ana", "Ana");
    let bea = common::token_for("usr_bea", "Bea");
    let id = seed(&state, "usr_bea", "private").await;

    let resp = server
        .delete(&format!("/api/v1/notifications/{id}"))
        .add_header(AUTHORIZATION, common::bearer(&ana))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let still_there = state.notifications.list_for_user("usr_bea", 50).await.unwrap();
    assert_eq!(still_there.len(), 1);

    let resp = server
        .delete(&format!("/api/v1/notifications/{id}"))
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    let resp = server
        .delete(&format!("/api/v1/notifications/{id}"))
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_notification_id_is_bad_request() {
    let (server, _state) = common::test_server().await;
    let bea = common::token_for("usr_bea", "Bea");

    let resp = server
        .delete("/api/v1/notifications/not-a-number")
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn marking_one_read_leaves_the_rest_unread() {
    let (server, state) = common::test_server().await;
    let bea = common::token_for("usr_bea", "Bea");

    let first = seed(&state, "usr_bea", "first").await;
    let second = seed(&state, "usr_bea", "second").await;

    let resp = server
        .put(&format!("/api/v1/notifications/{first}/read"))
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    let list = state.notifications.list_for_user("usr_bea", 50).await.unwrap();
    let read_of = |id: i64| list.iter().find(|n| n.id == id).map(|n| n.read);
    assert_eq!(read_of(first), Some(true));
    assert_eq!(read_of(second), Some(false));

    // Already read is still found.
    let again = server
        .put(&format!("/api/v1/notifications/{first}/read"))
        .add_header(AUTHORIZATION, common::bearer(&bea))
        .await;
    again.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn marking_someone_elses_notification_read_is_not_found() {
    let (server, state) = common::test_server().await;
    let ana = common::token_for("usr_ana", "Ana");
    let id = seed(&state, "usr_bea", "private").await;

    let resp = server
        .put(&format!("/api/v1/notifications/{id}/read"))
        .add_header(AUTHORIZATION, common::bearer(&ana))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let list = state.notifications.list_for_user("usr_bea", 50).await.unwrap();
    assert!(!list[0].read);

    let missing = server
        .put("/api/v1/notifications/12345/read")
        .add_header(AUTHORIZATION, common::bearer(&ana))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);

    let malformed = server
        .put("/api/v1/notifications/nope/read")
        .add_header(AUTHORIZATION, common::bearer(&ana))
        .await;
    malformed.assert_status(StatusCode::BAD_REQUEST);
}
