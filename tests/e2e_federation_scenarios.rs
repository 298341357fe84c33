//! E2E federation scenarios: the Follow/Accept handshake and Undo against a
//! live remote-peer double.

mod common;

use common::{follow_json, RemotePeer, TestServer};

#[tokio::test]
async fn test_follow_handshake_end_to_end() {
    let server = TestServer::new().await;
    let user = server.create_test_user("alice").await;
    let peer = RemotePeer::spawn().await;

    let follower = peer.actor_id("bob");
    let follow_id = format!("{}/activities/1", peer.actor_id("bob"));

    let response = server
        .client
        .post(&server.url("/users/alice/inbox"))
        .header("Content-Type", "application/activity+json")
        .json(&follow_json(&follow_id, &follower, &user.actor_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    // The follower shows up in the collection.
    let collection: serde_json::Value = server
        .client
        .get(&server.url("/users/alice/followers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(collection["totalItems"], 1);
    assert_eq!(collection["orderedItems"][0], follower);

    // An Accept embedding the original Follow reached bob's inbox.
    let posts = peer.inbox_posts();
    assert_eq!(posts.len(), 1);
    let accept = &posts[0];
    assert_eq!(accept["type"], "Accept");
    assert_eq!(accept["actor"], user.actor_id);
    assert_eq!(accept["object"]["id"], follow_id);
    assert_eq!(accept["object"]["type"], "Follow");
    assert_eq!(accept["object"]["actor"], follower);
    assert_eq!(accept["object"]["object"], user.actor_id);
}

#[tokio::test]
async fn test_duplicate_follow_delivery_is_idempotent() {
    let server = TestServer::new().await;
    let user = server.create_test_user("alice").await;
    let peer = RemotePeer::spawn().await;

    let follower = peer.actor_id("bob");
    let follow_id = format!("{}/activities/1", peer.actor_id("bob"));
    let body = follow_json(&follow_id, &follower, &user.actor_id);

    for _ in 0..2 {
        let response = server
            .client
            .post(&server.url("/users/alice/inbox"))
            .header("Content-Type", "application/activity+json")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);
    }

    let followers = server
        .state
        .db
        .get_follower_actor_ids(&user.id)
        .await
        .unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(peer.inbox_posts().len(), 1);
}

#[tokio::test]
async fn test_undo_follow_removes_the_follower() {
    let server = TestServer::new().await;
    let user = server.create_test_user("alice").await;
    let peer = RemotePeer::spawn().await;

    let follower = peer.actor_id("bob");
    let follow_id = format!("{}/activities/1", peer.actor_id("bob"));

    server
        .client
        .post(&server.url("/users/alice/inbox"))
        .header("Content-Type", "application/activity+json")
        .json(&follow_json(&follow_id, &follower, &user.actor_id))
        .send()
        .await
        .unwrap();

    let undo = serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": format!("{}/activities/2", peer.actor_id("bob")),
        "type": "Undo",
        "actor": follower,
        "object": {
            "id": follow_id,
            "type": "Follow",
            "actor": follower,
            "object": user.actor_id,
        },
    });

    let response = server
        .client
        .post(&server.url("/users/alice/inbox"))
        .header("Content-Type", "application/activity+json")
        .json(&undo)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let collection: serde_json::Value = server
        .client
        .get(&server.url("/users/alice/followers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(collection["totalItems"], 0);
}

#[tokio::test]
async fn test_failed_accept_delivery_is_reconciled_later() {
    let server = TestServer::new().await;
    let user = server.create_test_user("alice").await;
    let peer = RemotePeer::spawn().await;
    peer.set_failing(true);

    let follower = peer.actor_id("bob");
    let follow_id = format!("{}/activities/1", peer.actor_id("bob"));

    // Still 202: the activity is persisted even though the Accept bounced.
    let response = server
        .client
        .post(&server.url("/users/alice/inbox"))
        .header("Content-Type", "application/activity+json")
        .json(&follow_json(&follow_id, &follower, &user.actor_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let stored = server
        .state
        .db
        .get_activity(&follow_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.processed);
    assert!(peer.inbox_posts().is_empty());

    // Remote recovers; the reconciliation pass completes the handshake.
    peer.set_failing(false);
    let processed = server.state.inbox.process_pending(10).await.unwrap();
    assert_eq!(processed, 1);

    let stored = server
        .state
        .db
        .get_activity(&follow_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.processed);
    assert_eq!(peer.inbox_posts().len(), 1);
    assert_eq!(
        server
            .state
            .db
            .get_follower_actor_ids(&user.id)
            .await
            .unwrap()
            .len(),
        1
    );
}
