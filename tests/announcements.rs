mod support;

use axum::http::StatusCode;
use chrono::{Duration, Utc};

use school_portal::models::{Audience, Student};
use school_portal::role::Role;
use support::fixtures::{announcement, grade, parent, student, teacher};
use support::Harness;

fn titles(body: &serde_json::Value) -> Vec<String> {
    body["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|a| a["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn student_sees_own_grade_and_audience_newest_first() {
    let harness = Harness::new();
    let g1 = harness.seed(grade(1)).await;
    let g2 = harness.seed(grade(2)).await;
    let id = harness.seed(student("ada", g1)).await;
    let now = Utc::now();

    harness
        .seed(announcement("everyone", Audience::All, vec![], now - Duration::hours(5)))
        .await;
    harness
        .seed(announcement("students", Audience::Students, vec![], now - Duration::hours(1)))
        .await;
    harness
        .seed(announcement("teachers", Audience::Teachers, vec![], now))
        .await;
    harness
        .seed(announcement("g1 only", Audience::Parents, vec![g1], now - Duration::hours(3)))
        .await;
    harness
        .seed(announcement("g2 only", Audience::Parents, vec![g2], now - Duration::hours(2)))
        .await;

    let token = harness.token_expiring(id, Role::Student, now + Duration::hours(1));
    let reply = harness.get("/api/student/announcements", Some(&token)).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(titles(&reply.body), vec!["students", "g1 only", "everyone"]);
    assert_eq!(reply.body["total"], 3);
}

#[tokio::test]
async fn student_feed_is_capped_at_twenty() {
    let harness = Harness::new();
    let g1 = harness.seed(grade(1)).await;
    let id = harness.seed(student("ada", g1)).await;
    let now = Utc::now();
    for i in 0..25 {
        harness
            .seed(announcement(
                &format!("notice {}", i),
                Audience::Students,
                vec![],
                now - Duration::minutes(i),
            ))
            .await;
    }

    let token = harness.token(id, Role::Student);
    let reply = harness.get("/api/student/announcements", Some(&token)).await;
    let titles = titles(&reply.body);
    assert_eq!(titles.len(), 20);
    assert_eq!(titles[0], "notice 0");
    assert_eq!(titles[19], "notice 19");
}

#[tokio::test]
async fn expired_student_token_gets_no_announcements() {
    let harness = Harness::new();
    let g1 = harness.seed(grade(1)).await;
    let id = harness.seed(student("ada", g1)).await;
    harness
        .seed(announcement("everyone", Audience::All, vec![], Utc::now()))
        .await;
    let reads_before = harness.store.operations();

    let token = harness.token_expiring(id, Role::Student, Utc::now() - Duration::hours(1));
    let reply = harness.get("/api/student/announcements", Some(&token)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "SessionExpired");
    assert!(reply.body.get("data").is_none());
    assert_eq!(harness.store.operations(), reads_before);
}

#[tokio::test]
async fn teacher_feed_only_has_staff_notices() {
    let harness = Harness::new();
    let id = harness.seed(teacher("turing")).await;
    let now = Utc::now();
    harness
        .seed(announcement("everyone", Audience::All, vec![], now))
        .await;
    harness
        .seed(announcement("staff meeting", Audience::Teachers, vec![], now))
        .await;
    harness
        .seed(announcement("students", Audience::Students, vec![], now))
        .await;

    let token = harness.token(id, Role::Teacher);
    let reply = harness.get("/api/teacher/announcements", Some(&token)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let mut titles = titles(&reply.body);
    titles.sort();
    assert_eq!(titles, vec!["everyone", "staff meeting"]);
}

#[tokio::test]
async fn parent_feed_follows_children_grades() {
    let harness = Harness::new();
    let g1 = harness.seed(grade(1)).await;
    let g2 = harness.seed(grade(2)).await;
    let parent_id = harness.seed(parent("pat")).await;
    harness
        .seed(Student {
            parent_id: Some(parent_id),
            ..student("kid", g2)
        })
        .await;
    let now = Utc::now();
    harness
        .seed(announcement("g1 trip", Audience::Students, vec![g1], now))
        .await;
    harness
        .seed(announcement("g2 trip", Audience::Students, vec![g2], now - Duration::minutes(1)))
        .await;
    harness
        .seed(announcement("parents evening", Audience::Parents, vec![], now - Duration::minutes(2)))
        .await;

    let token = harness.token(parent_id, Role::Parent);
    let reply = harness.get("/api/parent/announcements", Some(&token)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(titles(&reply.body), vec!["g2 trip", "parents evening"]);
}
