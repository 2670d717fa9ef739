//! Domain model for talks.
//!
//! A talk is a named unit of orchestrated work. Its state lives in a single
//! [`Document`]: a tree of named nodes that agents evolve through
//! [`Patch`]es, selecting what they care about with [`PathQuery`]s.

mod document;
mod error;
mod ids;
mod patch;
mod path;
mod record;

pub use document::{Document, Node, ROOT, validate_name};
pub use error::{PatchError, PathError, TalkDomainError};
pub use ids::{RepoName, TalkName, TalkNumber};
pub use patch::{Directive, Patch};
pub use path::PathQuery;
pub use record::TalkRecord;
