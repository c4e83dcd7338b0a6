//! API integration tests: the end-to-end scenarios of the hub contract.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{get_json, join, post_json, send, send_raw, test_hub};

#[tokio::test]
async fn health_endpoint_works() {
    let t = test_hub().await;

    let (status, body) = get_json(&t.app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn join_send_mention_flow() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    join(&t.app, "lab", "a2", "Bob").await;

    let sent = send(&t.app, "a1", "hello @Bob").await;
    assert!(sent["messageId"].is_string());
    assert_eq!(sent["mentions"], json!(["Bob"]));

    // The log ends with Alice's message, mentions recorded.
    let (status, body) = get_json(&t.app, "/api/messages/lab?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    let last = messages.last().unwrap();
    assert_eq!(last["agentName"], "Alice");
    assert_eq!(last["content"], "hello @Bob");
    assert_eq!(last["mentions"], json!(["Bob"]));
    assert_eq!(last["id"], sent["messageId"]);

    // Bob has exactly one unread notification naming Alice.
    let (status, body) = get_json(&t.app, "/api/notifications/a2").await;
    assert_eq!(status, StatusCode::OK);
    let notifications = body["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["isRead"], false);
    assert_eq!(notifications[0]["room"], "lab");
    assert!(notifications[0]["message"]
        .as_str()
        .unwrap()
        .contains("Alice mentioned you"));

    // Alice mentioned nobody mentioned her; no notifications for a1.
    let (_, body) = get_json(&t.app, "/api/notifications/a1").await;
    assert_eq!(body["notifications"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    join(&t.app, "lab", "a2", "Bob").await;
    send(&t.app, "a1", "ping @Bob").await;

    let (_, body) = get_json(&t.app, "/api/notifications/a2").await;
    let id = body["notifications"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(&t.app, &format!("/api/notifications/{id}/read"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], true);

    let (status, body) = post_json(&t.app, &format!("/api/notifications/{id}/read"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], false);

    let (_, body) = get_json(&t.app, "/api/notifications/a2").await;
    assert_eq!(body["notifications"][0]["isRead"], true);

    // Unknown notification ids are a 404.
    let (status, _) = post_json(&t.app, "/api/notifications/nope/read", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mention_of_unknown_agent_is_recorded_but_not_notified() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    let sent = send(&t.app, "a1", "hey @Ghost are you there").await;
    assert_eq!(sent["mentions"], json!(["Ghost"]));

    let (_, body) = get_json(&t.app, "/api/messages/lab").await;
    let last = body["messages"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["mentions"], json!(["Ghost"]));
}

#[tokio::test]
async fn duplicate_mentions_notify_once() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    join(&t.app, "lab", "a2", "Bob").await;
    send(&t.app, "a1", "@Bob @Bob @Bob wake up").await;

    let (_, body) = get_json(&t.app, "/api/notifications/a2").await;
    assert_eq!(body["notifications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn broadcast_and_send_keep_accept_order() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    join(&t.app, "lab", "a2", "Bob").await;

    // Observe the bus the way a push session would.
    let mut events = t.hub.bus().subscribe();

    let (status, _) = post_json(
        &t.app,
        "/api/broadcast/lab",
        json!({ "content": "X", "from": "Op" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    send(&t.app, "a1", "Y").await;

    let (_, body) = get_json(&t.app, "/api/messages/lab?limit=2").await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["content"], "[Op] X");
    assert_eq!(messages[0]["type"], "broadcast");
    assert_eq!(messages[1]["content"], "Y");

    // Bus delivery preserves the same order.
    let first = events.recv().await.unwrap();
    let second = events.recv().await.unwrap();
    match (first.event, second.event) {
        (roost::bus::HubEvent::Message(a), roost::bus::HubEvent::Message(b)) => {
            assert_eq!(a.content, "[Op] X");
            assert_eq!(b.content, "Y");
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn task_lifecycle() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;

    let (status, body) = post_json(
        &t.app,
        "/api/tasks",
        json!({ "roomName": "lab", "title": "T", "description": "d", "creator": "Alice" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let task = &body["task"];
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "medium");
    let id = task["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &t.app,
        &format!("/api/tasks/{id}/update"),
        json!({ "status": "in_progress", "assignee": "Bob" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "in_progress");

    let (_, body) = get_json(&t.app, "/api/tasks/lab").await;
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["status"], "in_progress");
    assert_eq!(tasks[0]["assignee"], "Bob");
    let created = tasks[0]["createdAt"].as_str().unwrap();
    let updated = tasks[0]["updatedAt"].as_str().unwrap();
    assert!(updated > created, "updatedAt {updated} <= createdAt {created}");
}

#[tokio::test]
async fn task_validation_and_not_found() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;

    let (status, body) = post_json(
        &t.app,
        "/api/tasks",
        json!({ "roomName": "lab", "title": "T", "creator": "Alice", "priority": "urgent" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = post_json(
        &t.app,
        "/api/tasks",
        json!({ "roomName": "nowhere", "title": "T", "creator": "Alice" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&t.app, "/api/tasks/missing/update", json!({ "status": "done" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn memory_expires() {
    let t = test_hub().await;

    let (status, _) = post_json(
        &t.app,
        "/api/memory/a1",
        json!({ "key": "k", "value": "v", "expiresIn": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_json(&t.app, "/api/memory/a1").await;
    assert_eq!(body["memories"].as_array().unwrap().len(), 1);
    assert_eq!(body["memories"][0]["key"], "k");

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let (_, body) = get_json(&t.app, "/api/memory/a1").await;
    assert_eq!(body["memories"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn memory_filters_by_key_and_type() {
    let t = test_hub().await;

    for (key, value, mtype) in [("k1", "v1", "note"), ("k2", "v2", "fact"), ("k1", "v3", "fact")] {
        let (status, _) = post_json(
            &t.app,
            "/api/memory/a1",
            json!({ "key": key, "value": value, "type": mtype }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = get_json(&t.app, "/api/memory/a1?key=k1").await;
    assert_eq!(body["memories"].as_array().unwrap().len(), 2);

    let (_, body) = get_json(&t.app, "/api/memory/a1?key=k1&type=fact").await;
    let memories = body["memories"].as_array().unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0]["value"], "v3");
}

#[tokio::test]
async fn restart_preserves_rooms_and_messages() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    send(&t.app, "a1", "one").await;
    send(&t.app, "a1", "two").await;
    send(&t.app, "a1", "three").await;

    let (_, before) = get_json(&t.app, "/api/messages/lab").await;

    let t = t.restart().await;

    let (status, after) = get_json(&t.app, "/api/messages/lab").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before, after);

    let (_, rooms) = get_json(&t.app, "/api/rooms").await;
    let rooms = rooms["rooms"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["name"], "lab");
    // Alice never left; the roster survives the restart.
    assert_eq!(rooms[0]["agentCount"], 1);
}

#[tokio::test]
async fn history_boundaries() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    send(&t.app, "a1", "m1").await;
    send(&t.app, "a1", "m2").await;

    // Future `since` yields nothing.
    let (status, body) = get_json(&t.app, "/api/messages/lab?since=2999-01-01T00:00:00Z").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);

    // limit=0 is empty; junk and negative limits fall back to the default.
    let (_, body) = get_json(&t.app, "/api/messages/lab?limit=0").await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);
    let (_, body) = get_json(&t.app, "/api/messages/lab?limit=bogus").await;
    assert!(body["messages"].as_array().unwrap().len() >= 2);
    let (_, body) = get_json(&t.app, "/api/messages/lab?limit=-3").await;
    assert!(body["messages"].as_array().unwrap().len() >= 2);

    // limit=N returns the N most recent, chronological.
    let (_, body) = get_json(&t.app, "/api/messages/lab?limit=2").await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "m1");
    assert_eq!(messages[1]["content"], "m2");

    // Malformed `since` is a validation error.
    let (status, body) = get_json(&t.app, "/api/messages/lab?since=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Unknown room is a 404.
    let (status, _) = get_json(&t.app, "/api/messages/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn join_is_idempotent_and_counts_agents() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    let (_, rooms) = get_json(&t.app, "/api/rooms").await;
    assert_eq!(rooms["rooms"][0]["agentCount"], 1);

    join(&t.app, "lab", "a2", "Bob").await;
    let (_, rooms) = get_json(&t.app, "/api/rooms").await;
    assert_eq!(rooms["rooms"][0]["agentCount"], 2);

    // Re-joining changes nothing and appends no second system message.
    let (_, messages_before) = get_json(&t.app, "/api/messages/lab").await;
    join(&t.app, "lab", "a1", "Alice").await;
    let (_, rooms) = get_json(&t.app, "/api/rooms").await;
    assert_eq!(rooms["rooms"][0]["agentCount"], 2);
    let (_, messages_after) = get_json(&t.app, "/api/messages/lab").await;
    assert_eq!(messages_before, messages_after);
}

#[tokio::test]
async fn leave_removes_agent_and_logs_departure() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    join(&t.app, "lab", "a2", "Bob").await;

    let (status, body) = post_json(&t.app, "/api/leave/a1", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, agents) = get_json(&t.app, "/api/agents/lab").await;
    let agents = agents["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["name"], "Bob");

    let (_, body) = get_json(&t.app, "/api/messages/lab").await;
    let last = body["messages"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["type"], "system");
    assert_eq!(last["content"], "Alice left");

    // Leaving twice is a 404: the agent record is gone.
    let (status, _) = post_json(&t.app, "/api/leave/a1", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_requires_a_known_joined_agent() {
    let t = test_hub().await;

    let (status, body) = post_json(
        &t.app,
        "/api/send",
        json!({ "agentId": "ghost", "content": "hi" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn stats_reports_rooms_and_counts() {
    let t = test_hub().await;

    join(&t.app, "lab", "a1", "Alice").await;
    join(&t.app, "ops", "a2", "Bob").await;
    send(&t.app, "a1", "hi").await;
    post_json(
        &t.app,
        "/api/tasks",
        json!({ "roomName": "lab", "title": "T", "creator": "Alice" }),
    )
    .await;

    let (status, body) = get_json(&t.app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRooms"], 2);
    assert_eq!(body["totalAgents"], 2);
    assert_eq!(body["totalTasks"], 1);
    assert!(body["sharedDirectory"].is_string());

    let lab = body["rooms"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "lab")
        .unwrap();
    assert_eq!(lab["agentCount"], 1);
    assert_eq!(lab["isActive"], true);
    // "Alice joined" + "hi"
    assert_eq!(lab["messageCount"], 2);
}

#[tokio::test]
async fn files_round_trip_and_sandbox() {
    let t = test_hub().await;

    // Write, read back, list, delete.
    let (status, _) = send_raw(
        &t.app,
        Method::PUT,
        "/api/files?path=notes/plan.md",
        b"# plan".to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, bytes) = send_raw(&t.app, Method::GET, "/api/files?path=notes/plan.md", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"# plan");

    let (status, body) = get_json(&t.app, "/api/files/list?path=notes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["name"], "plan.md");

    let (status, _) = send_raw(&t.app, Method::DELETE, "/api/files?path=notes/plan.md", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_raw(&t.app, Method::GET, "/api/files?path=notes/plan.md", vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Escapes fail with a validation error and touch nothing.
    let (status, _) = send_raw(
        &t.app,
        Method::PUT,
        "/api/files?path=../escape.txt",
        b"x".to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!t.shared.path().parent().unwrap().join("escape.txt").exists());

    let (status, _) = send_raw(&t.app, Method::GET, "/api/files?path=/etc/passwd", vec![]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
