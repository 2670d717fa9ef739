//! A request from the queue to the archive.

use super::helpers::{Plant, text};
use rstest::{fixture, rstest};

#[fixture]
fn plant() -> Plant {
    Plant::new()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_deploy_is_reported_and_archived(plant: Plant) {
    plant.host.on("kill -0", 1, "");
    plant.host.on("cat status", 0, "0\n");
    plant.host.on("cat stdout", 0, "building\nPALAVER: deployed 1.0\n");

    plant.submit(Plant::item("widgets-1", "deploy")).await;

    let document = plant.document("widgets-1").await;
    assert!(!plant.is_active("widgets-1").await);
    assert!(document.section("archived").is_some());
    assert_eq!(text(&document, "request", "success").as_deref(), Some("true"));
    assert_eq!(text(&document, "daemon", "code").as_deref(), Some("0"));
    assert_eq!(text(&document, "daemon", "highlights").as_deref(), Some("deployed 1.0"));
    assert!(text(&document, "shell", "released").is_some());
    let posts = plant.inbox.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts.iter().all(|post| post.starts_with("widgets-1: deploy succeeded in ")));
    assert!(posts.iter().all(|post| post.ends_with("\ndeployed 1.0")));
    let commands = plant.host.commands();
    assert!(commands.iter().any(|command| command.contains("cat > run.sh")));
    assert!(commands.iter().any(|command| command.contains("nohup ./run.sh")));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_script_is_reported_with_its_code(plant: Plant) {
    plant.host.on("kill -0", 1, "");
    plant.host.on("cat status", 0, "2\n");
    plant.host.on("cat stdout", 0, "make: *** [deploy] Error 2\n");

    plant.submit(Plant::item("widgets-2", "deploy")).await;

    let document = plant.document("widgets-2").await;
    assert!(!plant.is_active("widgets-2").await);
    assert_eq!(text(&document, "request", "success").as_deref(), Some("false"));
    assert_eq!(
        text(&document, "daemon", "tail").as_deref(),
        Some("make: *** [deploy] Error 2")
    );
    assert_eq!(plant.inbox.posts(), vec!["widgets-2: deploy failed with code 2".to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn running_daemons_are_finished_by_the_sweep(plant: Plant) {
    plant.host.on("kill -0", 0, "");

    plant.submit(Plant::item("widgets-3", "release")).await;
    let running = plant.document("widgets-3").await;
    plant.host.on("kill -0", 1, "");
    plant.host.on("cat status", 0, "0\n");
    let swept = plant.dispatcher.sweep().await.expect("sweep");

    assert!(text(&running, "daemon", "started").is_some());
    assert!(text(&running, "daemon", "ended").is_none());
    assert_eq!(swept, 1);
    assert!(!plant.is_active("widgets-3").await);
    assert_eq!(plant.inbox.posts().len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_commands_are_recorded_as_errors(plant: Plant) {
    plant.submit(Plant::item("widgets-4", "launch")).await;

    let document = plant.document("widgets-4").await;
    let error = document
        .section("errors")
        .and_then(|errors| errors.child("error"))
        .expect("error recorded");
    assert_eq!(error.attribute("agent"), Some("starts-request"));
    assert_eq!(error.text(), Some("'launch' is not implemented"));
    assert!(document.section("daemon").is_none());
    assert!(plant.is_active("widgets-4").await);
    assert!(plant.host.commands().is_empty());
}
