//! Containers started on a docker host reached over a shell.

use super::environment::Environment;
use super::error::{ProvisionError, ProvisionResult};
use super::ports::Provisioner;
use crate::shell::{ShellExt, ShellHandle, command_line};
use crate::talk::domain::TalkName;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Port the container's SSH daemon listens on inside the container.
const CONTAINER_SSH_PORT: u16 = 22;

/// Runs one container per talk with `docker run -d -P`.
#[derive(Debug, Clone)]
pub struct ContainerProvisioner {
    docker: ShellHandle,
    image: String,
    host: String,
    login: String,
    key: String,
}

impl ContainerProvisioner {
    /// Uses `docker` to reach the docker host, which is also reachable by
    /// SSH at `host`.
    #[must_use]
    pub fn new(docker: ShellHandle, image: &str, host: &str, login: &str, key: &str) -> Self {
        Self {
            docker,
            image: image.to_owned(),
            host: host.to_owned(),
            login: login.to_owned(),
            key: key.to_owned(),
        }
    }

    /// Finds the host port mapped to the container's SSH port.
    async fn published(&self, name: &str) -> ProvisionResult<u16> {
        let port = CONTAINER_SSH_PORT.to_string();
        let mapping = self.run(&["docker", "port", name, &port]).await?;
        published_port(&mapping)
    }

    async fn run(&self, words: &[&str]) -> ProvisionResult<String> {
        let command = command_line(words);
        let (code, output) = self.docker.exec_plain(&command).await?;
        if code == 0 {
            Ok(output)
        } else {
            Err(ProvisionError::Command { command, code, output })
        }
    }
}

/// Derives a docker-safe container name from a talk name.
///
/// The readable part keeps at most 32 characters; the hash suffix keeps
/// distinct talks apart after sanitizing.
#[must_use]
pub fn container_name(talk: &TalkName) -> String {
    let readable: String = talk
        .as_str()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .take(32)
        .collect();
    let digest = Sha256::digest(talk.as_str().as_bytes());
    let suffix: String = digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect();
    format!("palaver-{readable}-{suffix}")
}

/// Extracts the host port from `docker port` output such as
/// `0.0.0.0:49153` or `[::]:49153`.
fn published_port(output: &str) -> ProvisionResult<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
        .ok_or_else(|| ProvisionError::UnexpectedOutput(output.trim().to_owned()))
}

#[async_trait]
impl Provisioner for ContainerProvisioner {
    async fn acquire(&self, talk: &TalkName) -> ProvisionResult<Environment> {
        let name = container_name(talk);
        self.run(&["docker", "run", "-d", "-P", "--name", &name, &self.image])
            .await?;
        let published = match self.published(&name).await {
            Ok(published) => published,
            Err(err) => {
                if let Err(cleanup) = self.run(&["docker", "rm", "-f", &name]).await {
                    tracing::warn!(container = %name, error = %cleanup, "failed to remove unusable container");
                }
                return Err(err);
            }
        };
        tracing::info!(talk = %talk, container = %name, port = published, "container started");
        Ok(Environment {
            id: name,
            host: self.host.clone(),
            port: published,
            login: self.login.clone(),
            key: self.key.clone(),
            immortal: false,
        })
    }

    async fn release(&self, environment: &Environment) -> ProvisionResult<()> {
        self.run(&["docker", "rm", "-f", &environment.id]).await?;
        tracing::info!(container = %environment.id, "container removed");
        Ok(())
    }
}
