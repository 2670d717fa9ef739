//! The built-in agents, from request intake to archiving.

mod daemons;
mod outcome;
mod requests;
mod shells;

pub use daemons::{DaemonSettings, EndsDaemon, HIGHLIGHT_PREFIX, StartsDaemon, StopsDaemon};
pub use outcome::{ArchivesTalk, ReportsOutcome};
pub use requests::{CancelsRequest, EndsRequest, StartsRequest};
pub use shells::{ProvisionsShell, ReleasesShell};

use super::error::AgentError;
use crate::talk::domain::{Document, Node, TalkName};
use chrono::{DateTime, SecondsFormat, Utc};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;

/// Clock wrapper producing the timestamps agents write into talks.
#[derive(Clone)]
pub struct Timestamps {
    clock: Arc<dyn Clock>,
}

impl Timestamps {
    /// Wraps a clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Current instant.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Current instant in RFC 3339 form with milliseconds.
    #[must_use]
    pub fn iso(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Debug for Timestamps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timestamps").finish_non_exhaustive()
    }
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

fn section<'a>(document: &'a Document, name: &str) -> Result<&'a Node, AgentError> {
    document
        .section(name)
        .ok_or_else(|| AgentError::Malformed(format!("missing /talk/{name}")))
}

fn field<'a>(node: &'a Node, name: &str) -> Result<&'a str, AgentError> {
    node.child_text(name)
        .ok_or_else(|| AgentError::Malformed(format!("missing {}/{name}", node.name())))
}

fn talk_name(document: &Document) -> Result<TalkName, AgentError> {
    document
        .talk_name()
        .and_then(|name| TalkName::new(name).ok())
        .ok_or_else(|| AgentError::Malformed("talk has no usable name".to_owned()))
}
