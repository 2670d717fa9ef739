//! Execution environments handed out by provisioners.

use super::error::{ProvisionError, ProvisionResult};
use crate::talk::domain::{Document, Node, Patch};
use std::fmt;

/// Where a talk's daemon runs and how to reach it.
#[derive(Clone, PartialEq, Eq)]
pub struct Environment {
    /// Provider-side identifier, used on release.
    pub id: String,
    /// Host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// SSH user.
    pub login: String,
    /// Private key text.
    pub key: String,
    /// Whether release must leave the environment running.
    pub immortal: bool,
}

impl Environment {
    /// Reads the environment recorded under `/talk/shell`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Incomplete`] when the section or one of its
    /// fields is missing.
    pub fn from_document(document: &Document) -> ProvisionResult<Self> {
        let shell = document
            .section("shell")
            .ok_or_else(|| ProvisionError::Incomplete("shell".to_owned()))?;
        Self::from_node(shell)
    }

    fn from_node(shell: &Node) -> ProvisionResult<Self> {
        let field = |name: &str| {
            shell
                .child_text(name)
                .map(str::to_owned)
                .ok_or_else(|| ProvisionError::Incomplete(format!("shell/{name}")))
        };
        let id = shell
            .attribute("id")
            .map(str::to_owned)
            .ok_or_else(|| ProvisionError::Incomplete("shell/@id".to_owned()))?;
        let port = field("port")?
            .trim()
            .parse()
            .map_err(|_| ProvisionError::Incomplete("numeric shell/port".to_owned()))?;
        Ok(Self {
            id,
            host: field("host")?,
            port,
            login: field("login")?,
            key: field("key")?,
            immortal: shell.has_child("immortal"),
        })
    }

    /// Directives that record this environment as the talk's shell.
    #[must_use]
    pub fn to_patch(&self) -> Patch {
        let patch = Patch::new()
            .add("shell")
            .attr("id", self.id.as_str())
            .add("host")
            .set(self.host.as_str())
            .up()
            .add("port")
            .set(self.port.to_string())
            .up()
            .add("login")
            .set(self.login.as_str())
            .up()
            .add("key")
            .set(self.key.as_str())
            .up();
        if self.immortal {
            patch.add("immortal").set("true").up()
        } else {
            patch
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("immortal", &self.immortal)
            .finish_non_exhaustive()
    }
}
