//! Identifier and validated scalar types for talks.

use super::TalkDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier assigned to a talk by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TalkNumber(u64);

impl TalkNumber {
    /// Wraps a raw talk number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the number following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for TalkNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique human readable talk name, for example `acme/widgets#42`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TalkName(String);

impl TalkName {
    /// Creates a validated talk name.
    ///
    /// # Errors
    ///
    /// Returns [`TalkDomainError::EmptyTalkName`] when the name is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, TalkDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TalkDomainError::EmptyTalkName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TalkName {
    type Error = TalkDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TalkName> for String {
    fn from(value: TalkName) -> Self {
        value.0
    }
}

impl AsRef<str> for TalkName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TalkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Repository name in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName(String);

impl RepoName {
    /// Creates a validated repository name.
    ///
    /// # Errors
    ///
    /// Returns [`TalkDomainError::InvalidRepository`] when the value is not
    /// exactly two non-empty segments separated by `/`.
    pub fn new(value: impl Into<String>) -> Result<Self, TalkDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        let mut segments = trimmed.split('/');
        let valid = matches!(
            (segments.next(), segments.next(), segments.next()),
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
        );
        if !valid {
            return Err(TalkDomainError::InvalidRepository(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the repository name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoName {
    type Error = TalkDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepoName> for String {
    fn from(value: RepoName) -> Self {
        value.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
