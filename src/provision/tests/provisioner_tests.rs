//! Behaviour tests for the provisioners.

use crate::provision::{
    ContainerProvisioner, Environment, Immortal, InstanceHandle, InstanceProvisioner, MockInstanceApi,
    ProvisionError, Provisioner, Reachability, StaticHost, container_name,
};
use crate::talk::domain::{Document, TalkName, TalkNumber};
use crate::test_support::ScriptedShell;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

fn talk(raw: &str) -> TalkName {
    TalkName::new(raw).expect("valid name")
}

#[rstest]
fn container_names_are_stable_sanitized_and_distinct() {
    let spaced = container_name(&talk("Acme Widgets #42"));
    let dashed = container_name(&talk("acme-widgets--42"));

    assert_eq!(spaced, container_name(&talk("Acme Widgets #42")));
    assert!(spaced.starts_with("palaver-acme-widgets--42-"));
    assert!(spaced.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')));
    assert_ne!(spaced, dashed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn container_is_run_and_its_port_published() {
    let docker = ScriptedShell::new();
    docker.on("docker run", 0, "3f2a9c\n");
    docker.on("docker port", 0, "0.0.0.0:49153\n[::]:49153\n");
    let provisioner = ContainerProvisioner::new(docker.clone(), "palaver/build", "10.0.0.5", "root", "KEY");

    let environment = provisioner.acquire(&talk("acme-1")).await.expect("acquire");
    provisioner.release(&environment).await.expect("release");

    assert_eq!(environment.host, "10.0.0.5");
    assert_eq!(environment.port, 49153);
    assert_eq!(environment.id, container_name(&talk("acme-1")));
    let commands = docker.commands();
    assert_eq!(commands.len(), 3);
    assert!(commands.first().is_some_and(|cmd| cmd.starts_with("docker run -d -P --name palaver-acme-1-")));
    assert_eq!(commands.last(), Some(&format!("docker rm -f {}", environment.id)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_docker_command_is_reported() {
    let docker = ScriptedShell::new();
    docker.on("docker run", 125, "no such image");
    let provisioner = ContainerProvisioner::new(docker, "missing", "10.0.0.5", "root", "KEY");

    let result = provisioner.acquire(&talk("acme-1")).await;

    assert!(matches!(result, Err(ProvisionError::Command { code: 125, .. })));
}

#[rstest]
#[case::unparsable_mapping(0, "nothing published")]
#[case::failing_port_query(1, "Error: No public port '22/tcp' published")]
#[tokio::test(flavor = "multi_thread")]
async fn container_without_a_usable_port_is_removed(#[case] code: i32, #[case] output: &str) {
    let docker = ScriptedShell::new();
    docker.on("docker port", code, output);
    let provisioner = ContainerProvisioner::new(docker.clone(), "palaver/build", "10.0.0.5", "root", "KEY");

    let result = provisioner.acquire(&talk("acme-1")).await;

    if code == 0 {
        assert!(matches!(result, Err(ProvisionError::UnexpectedOutput(_))));
    } else {
        assert!(matches!(result, Err(ProvisionError::Command { code: 1, .. })));
    }
    let name = container_name(&talk("acme-1"));
    assert_eq!(docker.commands().last(), Some(&format!("docker rm -f {name}")));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_cleanup_keeps_the_original_error() {
    let docker = ScriptedShell::new();
    docker.on("docker port", 0, "nothing published");
    docker.on("docker rm", 1, "daemon unreachable");
    let provisioner = ContainerProvisioner::new(docker.clone(), "palaver/build", "10.0.0.5", "root", "KEY");

    let result = provisioner.acquire(&talk("acme-1")).await;

    assert!(matches!(result, Err(ProvisionError::UnexpectedOutput(_))));
    assert_eq!(docker.commands().len(), 3);
}

fn quick_probe() -> Reachability {
    Reachability {
        attempts: 2,
        delay: Duration::from_millis(10),
        timeout: Duration::from_millis(500),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reachable_instance_is_handed_out_and_terminated_on_release() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let mut api = MockInstanceApi::new();
    api.expect_run_on_demand().times(1).returning(|| {
        Ok(InstanceHandle {
            id: "i-0abc".to_owned(),
            address: "127.0.0.1".to_owned(),
        })
    });
    api.expect_terminate()
        .withf(|id: &str| id == "i-0abc")
        .times(1)
        .returning(|_| Ok(()));
    let provisioner = InstanceProvisioner::new(api, port, "ubuntu", "KEY").with_reachability(quick_probe());

    let environment = provisioner.acquire(&talk("acme-1")).await.expect("acquire");
    provisioner.release(&environment).await.expect("release");

    assert_eq!((environment.id.as_str(), environment.port), ("i-0abc", port));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreachable_instance_is_terminated() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    let mut api = MockInstanceApi::new();
    api.expect_run_on_demand().returning(|| {
        Ok(InstanceHandle {
            id: "i-dead".to_owned(),
            address: "127.0.0.1".to_owned(),
        })
    });
    api.expect_terminate().times(1).returning(|_| Ok(()));
    let provisioner = InstanceProvisioner::new(api, port, "ubuntu", "KEY").with_reachability(quick_probe());

    let result = provisioner.acquire(&talk("acme-1")).await;

    assert!(matches!(result, Err(ProvisionError::Unreachable { attempts: 2, .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn immortal_environments_survive_release() {
    let provisioner = Immortal::new(StaticHost::new("10.0.0.9", 22, "root", "KEY"));

    let environment = provisioner.acquire(&talk("acme-1")).await.expect("acquire");

    assert!(environment.immortal);
    provisioner.release(&environment).await.expect("release is a no-op");
}

#[rstest]
fn environment_round_trips_through_the_document() {
    let environment = Environment {
        id: "c-1".to_owned(),
        host: "10.0.0.5".to_owned(),
        port: 2201,
        login: "root".to_owned(),
        key: "KEY".to_owned(),
        immortal: true,
    };
    let document = Document::new(&talk("acme-1"), TalkNumber::new(1));

    let recorded = environment.to_patch().apply(&document).expect("patch applies");

    assert_eq!(Environment::from_document(&recorded).expect("environment"), environment);
    assert!(matches!(
        Environment::from_document(&document),
        Err(ProvisionError::Incomplete(_))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn static_host_is_shared() {
    let host: Arc<dyn Provisioner> = Arc::new(StaticHost::new("10.0.0.9", 22, "root", "KEY"));

    let first = host.acquire(&talk("a")).await.expect("acquire");
    let second = host.acquire(&talk("b")).await.expect("acquire");

    assert_eq!(first, second);
}
