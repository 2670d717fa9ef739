//! Persisted form of a talk.

use super::{Document, RepoName, TalkName, TalkNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything a store keeps about one talk.
///
/// `version` increases with every accepted write; stores compare it to
/// detect conflicting writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkRecord {
    /// Store-assigned number.
    pub number: TalkNumber,
    /// Unique talk name.
    pub name: TalkName,
    /// Repository the talk belongs to.
    pub repo: RepoName,
    /// `false` once the talk is terminal.
    pub active: bool,
    /// Time of the last accepted write.
    pub updated: DateTime<Utc>,
    /// Write counter.
    pub version: u64,
    /// Current document.
    pub document: Document,
}

impl TalkRecord {
    /// Creates the record of a freshly created, active talk.
    #[must_use]
    pub fn new(number: TalkNumber, name: TalkName, repo: RepoName, now: DateTime<Utc>) -> Self {
        let document = Document::new(&name, number);
        Self {
            number,
            name,
            repo,
            active: true,
            updated: now,
            version: 0,
            document,
        }
    }

    /// Replaces the document and bumps the version and timestamp.
    pub fn replace(&mut self, document: Document, now: DateTime<Utc>) {
        self.document = document;
        self.updated = now;
        self.version = self.version.saturating_add(1);
    }
}
