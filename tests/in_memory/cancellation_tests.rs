//! `stop` items before and after the daemon starts.

use super::helpers::{Plant, text};
use rstest::{fixture, rstest};

#[fixture]
fn plant() -> Plant {
    Plant::new()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stopping_an_unstarted_request_closes_the_talk(plant: Plant) {
    plant.submit(Plant::item("widgets-5", "launch")).await;

    plant.submit(Plant::item("widgets-5", "stop")).await;

    let document = plant.document("widgets-5").await;
    assert_eq!(text(&document, "request", "cancel").as_deref(), Some("alice"));
    assert_eq!(text(&document, "request", "success").as_deref(), Some("false"));
    assert!(!plant.is_active("widgets-5").await);
    assert_eq!(plant.inbox.posts(), vec!["widgets-5: launch was cancelled".to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stopping_a_running_daemon_kills_it(plant: Plant) {
    plant.host.on("kill -0", 0, "");
    plant.submit(Plant::item("widgets-6", "deploy")).await;

    plant.submit(Plant::item("widgets-6", "stop")).await;
    let stopping = plant.document("widgets-6").await;
    plant.host.on("kill -0", 1, "");
    plant.host.on("cat status", 0, "143\n");
    plant.dispatcher.sweep().await.expect("sweep");

    let stopped = stopping
        .section("daemon")
        .and_then(|daemon| daemon.child("stopped"))
        .expect("stop recorded");
    assert_eq!(stopped.attribute("reason"), Some("cancel"));
    assert!(plant.host.commands().iter().any(|command| command.contains("kill -TERM")));
    let document = plant.document("widgets-6").await;
    assert_eq!(text(&document, "request", "success").as_deref(), Some("false"));
    assert!(!plant.is_active("widgets-6").await);
    assert_eq!(plant.inbox.posts(), vec!["widgets-6: deploy failed with code 143".to_owned()]);
}
