//! Ordered structural edits applied to talk documents.

use super::{Document, Node, PatchError, PathQuery, validate_name};

/// A single cursor-based edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Moves the cursor to every node matching the query.
    XPath(PathQuery),
    /// Fails unless the cursor holds exactly this many nodes.
    Strict(usize),
    /// Appends a child to every cursor node and moves onto the new children.
    Add(String),
    /// Like [`Directive::Add`], but reuses an existing child of that name.
    AddIf(String),
    /// Replaces the text of every cursor node.
    Set(String),
    /// Sets an attribute on every cursor node.
    Attr(String, String),
    /// Moves the cursor to the parents of the current nodes.
    Up,
    /// Removes every cursor node; the cursor returns to the root.
    Remove,
}

/// An ordered list of directives, applied atomically.
///
/// The cursor starts at the root. Application works on a copy, so a failing
/// directive leaves the input document untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    directives: Vec<Directive>,
}

impl Patch {
    /// Creates an empty patch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            directives: Vec::new(),
        }
    }

    /// Appends [`Directive::XPath`].
    #[must_use]
    pub fn xpath(self, query: &PathQuery) -> Self {
        self.push(Directive::XPath(query.clone()))
    }

    /// Appends [`Directive::Strict`].
    #[must_use]
    pub fn strict(self, count: usize) -> Self {
        self.push(Directive::Strict(count))
    }

    /// Appends [`Directive::Add`].
    #[must_use]
    pub fn add(self, name: &str) -> Self {
        self.push(Directive::Add(name.to_owned()))
    }

    /// Appends [`Directive::AddIf`].
    #[must_use]
    pub fn add_if(self, name: &str) -> Self {
        self.push(Directive::AddIf(name.to_owned()))
    }

    /// Appends [`Directive::Set`].
    #[must_use]
    pub fn set(self, text: impl Into<String>) -> Self {
        self.push(Directive::Set(text.into()))
    }

    /// Appends [`Directive::Attr`].
    #[must_use]
    pub fn attr(self, name: &str, value: impl Into<String>) -> Self {
        self.push(Directive::Attr(name.to_owned(), value.into()))
    }

    /// Appends [`Directive::Up`].
    #[must_use]
    pub fn up(self) -> Self {
        self.push(Directive::Up)
    }

    /// Appends [`Directive::Remove`].
    #[must_use]
    pub fn remove(self) -> Self {
        self.push(Directive::Remove)
    }

    /// Appends every directive of `other`.
    #[must_use]
    pub fn append(mut self, other: Self) -> Self {
        self.directives.extend(other.directives);
        self
    }

    /// Returns `true` when the patch carries no directives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Returns the directives in order.
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    fn push(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// Applies the patch to a copy of `document`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] naming the first directive that could not be
    /// applied. Nothing is applied in that case.
    pub fn apply(&self, document: &Document) -> Result<Document, PatchError> {
        let mut next = document.clone();
        let mut cursor: Vec<Vec<usize>> = vec![Vec::new()];
        for (index, directive) in self.directives.iter().enumerate() {
            cursor = step(&mut next, cursor, index, directive)?;
        }
        Ok(next)
    }
}

fn step(
    document: &mut Document,
    cursor: Vec<Vec<usize>>,
    index: usize,
    directive: &Directive,
) -> Result<Vec<Vec<usize>>, PatchError> {
    match directive {
        Directive::XPath(query) => Ok(query.positions(document.root())),
        Directive::Strict(expected) => {
            if cursor.len() == *expected {
                Ok(cursor)
            } else {
                Err(PatchError::StrictMismatch {
                    index,
                    expected: *expected,
                    found: cursor.len(),
                })
            }
        }
        Directive::Add(name) => add_children(document, &cursor, index, name, false),
        Directive::AddIf(name) => add_children(document, &cursor, index, name, true),
        Directive::Set(text) => {
            for position in &cursor {
                if let Some(node) = document.node_mut(position) {
                    node.set_text(text);
                }
            }
            Ok(cursor)
        }
        Directive::Attr(name, value) => {
            validate_name(name).map_err(|source| PatchError::InvalidName { index, source })?;
            for position in &cursor {
                if let Some(node) = document.node_mut(position) {
                    node.set_attribute(name, value);
                }
            }
            Ok(cursor)
        }
        Directive::Up => {
            let mut parents: Vec<Vec<usize>> = Vec::with_capacity(cursor.len());
            for mut position in cursor {
                if position.pop().is_none() {
                    return Err(PatchError::AboveRoot { index });
                }
                if !parents.contains(&position) {
                    parents.push(position);
                }
            }
            Ok(parents)
        }
        Directive::Remove => {
            let mut doomed = cursor;
            doomed.sort_unstable_by(|left, right| right.cmp(left));
            doomed.dedup();
            for mut position in doomed {
                let Some(last) = position.pop() else {
                    return Err(PatchError::RemoveRoot { index });
                };
                if let Some(parent) = document.node_mut(&position) {
                    parent.remove_child(last);
                }
            }
            Ok(vec![Vec::new()])
        }
    }
}

fn add_children(
    document: &mut Document,
    cursor: &[Vec<usize>],
    index: usize,
    name: &str,
    reuse: bool,
) -> Result<Vec<Vec<usize>>, PatchError> {
    let template = Node::new(name).map_err(|source| PatchError::InvalidName { index, source })?;
    let mut moved = Vec::with_capacity(cursor.len());
    for position in cursor {
        let Some(parent) = document.node_mut(position) else {
            continue;
        };
        let existing = if reuse { parent.position_of(name) } else { None };
        let child = existing.unwrap_or_else(|| parent.push_child(template.clone()));
        let mut path = position.clone();
        path.push(child);
        moved.push(path);
    }
    Ok(moved)
}
