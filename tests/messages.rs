mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use school_portal::role::Role;
use support::fixtures::{grade, parent, student, teacher};
use support::Harness;

#[tokio::test]
async fn message_round_trip_between_parent_and_teacher() {
    let harness = Harness::new();
    let parent_id = harness.seed(parent("pat")).await;
    let teacher_id = harness.seed(teacher("turing")).await;
    let parent_token = harness.token(parent_id, Role::Parent);
    let teacher_token = harness.token(teacher_id, Role::Teacher);

    let sent = harness
        .call(
            Method::POST,
            "/api/messages",
            Some(&parent_token),
            Some(json!({
                "recipient_id": teacher_id,
                "recipient_role": "teacher",
                "subject": "Homework",
                "body": "Is there homework this weekend?",
            })),
        )
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.body["sender_id"], parent_id.to_string());
    assert_eq!(sent.body["read"], false);
    let message_id = sent.body["id"].as_str().unwrap().to_string();

    let outbox = harness.get("/api/messages/sent", Some(&parent_token)).await;
    assert_eq!(outbox.body["total"], 1);

    let inbox = harness.get("/api/messages", Some(&teacher_token)).await;
    assert_eq!(inbox.status, StatusCode::OK);
    assert_eq!(inbox.body["total"], 1);
    assert_eq!(inbox.body["data"][0]["subject"], "Homework");

    let parent_inbox = harness.get("/api/messages", Some(&parent_token)).await;
    assert_eq!(parent_inbox.body["total"], 0);

    let snoop = harness
        .call(
            Method::PUT,
            &format!("/api/messages/read/{}", message_id),
            Some(&parent_token),
            None,
        )
        .await;
    assert_eq!(snoop.status, StatusCode::NOT_FOUND);

    let read = harness
        .call(
            Method::PUT,
            &format!("/api/messages/read/{}", message_id),
            Some(&teacher_token),
            None,
        )
        .await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["read"], true);
}

#[tokio::test]
async fn sending_to_unknown_recipient_is_not_found() {
    let harness = Harness::new();
    let g1 = harness.seed(grade(1)).await;
    let student_id = harness.seed(student("ada", g1)).await;
    let token = harness.token(student_id, Role::Student);

    let reply = harness
        .call(
            Method::POST,
            "/api/messages",
            Some(&token),
            Some(json!({
                "recipient_id": Uuid::new_v4(),
                "recipient_role": "teacher",
                "subject": "Hi",
                "body": "Hello",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(harness.store.mutations(), 2);
}

#[tokio::test]
async fn sender_without_record_is_not_found() {
    let harness = Harness::new();
    let teacher_id = harness.seed(teacher("turing")).await;
    let ghost = harness.token(Uuid::new_v4(), Role::Parent);

    let reply = harness
        .call(
            Method::POST,
            "/api/messages",
            Some(&ghost),
            Some(json!({
                "recipient_id": teacher_id,
                "recipient_role": "teacher",
                "subject": "Hi",
                "body": "Hello",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_can_list_and_delete_messages() {
    let harness = Harness::new();
    let parent_id = harness.seed(parent("pat")).await;
    let teacher_id = harness.seed(teacher("turing")).await;
    let parent_token = harness.token(parent_id, Role::Parent);
    let admin = harness.admin().await;

    let sent = harness
        .call(
            Method::POST,
            "/api/messages",
            Some(&parent_token),
            Some(json!({
                "recipient_id": teacher_id,
                "recipient_role": "teacher",
                "subject": "Spam",
                "body": "Buy now",
            })),
        )
        .await;
    let id = sent.body["id"].as_str().unwrap().to_string();

    let listed = harness.get("/api/admin/messages", Some(&admin)).await;
    assert_eq!(listed.body["total"], 1);

    let deleted = harness
        .call(Method::DELETE, &format!("/api/admin/messages/{}", id), Some(&admin), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let listed = harness.get("/api/admin/messages", Some(&admin)).await;
    assert_eq!(listed.body["total"], 0);
}
