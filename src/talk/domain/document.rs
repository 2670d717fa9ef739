//! Tree-structured talk documents.

use super::{PathQuery, TalkDomainError, TalkName, TalkNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the single root node every talk document carries.
pub const ROOT: &str = "talk";

/// A named node with ordered children, attributes and optional text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Node>,
}

impl Node {
    /// Creates an empty node after validating its name.
    ///
    /// # Errors
    ///
    /// Returns [`TalkDomainError::InvalidNodeName`] when the name is empty,
    /// starts with a digit or punctuation, or contains characters other than
    /// ASCII letters, digits, `-`, `_` and `.`.
    pub fn new(name: &str) -> Result<Self, TalkDomainError> {
        validate_name(name)?;
        Ok(Self::named(name))
    }

    fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            attributes: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the node text, if any was set.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns the attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the children in document order.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Returns the first child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Returns every child with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Returns the text of the first child with the given name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Self::text)
    }

    /// Returns `true` when a child with the given name exists.
    #[must_use]
    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    pub(crate) fn set_text(&mut self, text: &str) {
        self.text = Some(text.to_owned());
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_owned(), value.to_owned());
    }

    pub(crate) fn push_child(&mut self, child: Self) -> usize {
        self.children.push(child);
        self.children.len().saturating_sub(1)
    }

    pub(crate) fn remove_child(&mut self, index: usize) -> Option<Self> {
        (index < self.children.len()).then(|| self.children.remove(index))
    }

    pub(crate) fn position_of(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name == name)
    }

    fn descend(&self, position: &[usize]) -> Option<&Self> {
        position
            .iter()
            .try_fold(self, |node, index| node.children.get(*index))
    }

    fn descend_mut(&mut self, position: &[usize]) -> Option<&mut Self> {
        position
            .iter()
            .try_fold(self, |node, index| node.children.get_mut(*index))
    }
}

/// Checks that a node or attribute name is a plain identifier.
///
/// # Errors
///
/// Returns [`TalkDomainError::InvalidNodeName`] for anything else.
pub fn validate_name(name: &str) -> Result<(), TalkDomainError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let tail_ok = chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(TalkDomainError::InvalidNodeName(name.to_owned()))
    }
}

/// A talk document: a single `talk` root and everything recorded under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Node", into = "Node")]
pub struct Document {
    root: Node,
}

impl Document {
    /// Creates the initial document of a new talk.
    #[must_use]
    pub fn new(name: &TalkName, number: TalkNumber) -> Self {
        let mut root = Node::named(ROOT);
        root.set_attribute("name", name.as_str());
        root.set_attribute("number", &number.to_string());
        root.set_attribute("later", "false");
        Self { root }
    }

    /// Wraps an existing root node, as read back from storage.
    ///
    /// # Errors
    ///
    /// Returns [`TalkDomainError::InvalidNodeName`] when the root is not
    /// named `talk`.
    pub fn from_root(root: Node) -> Result<Self, TalkDomainError> {
        if root.name != ROOT {
            return Err(TalkDomainError::InvalidNodeName(root.name));
        }
        Ok(Self { root })
    }

    /// Returns the root node.
    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Returns the talk name recorded on the root.
    #[must_use]
    pub fn talk_name(&self) -> Option<&str> {
        self.root.attribute("name")
    }

    /// Returns the first child of the root with the given name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Node> {
        self.root.child(name)
    }

    /// Returns every node matching the query, in document order.
    #[must_use]
    pub fn select(&self, query: &PathQuery) -> Vec<&Node> {
        query
            .positions(&self.root)
            .iter()
            .filter_map(|position| self.root.descend(position))
            .collect()
    }

    /// Returns `true` when at least one node matches the query.
    #[must_use]
    pub fn matches(&self, query: &PathQuery) -> bool {
        !query.positions(&self.root).is_empty()
    }

    pub(crate) fn node_mut(&mut self, position: &[usize]) -> Option<&mut Node> {
        self.root.descend_mut(position)
    }

    pub(crate) fn node(&self, position: &[usize]) -> Option<&Node> {
        self.root.descend(position)
    }

    pub(crate) fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }
}

impl TryFrom<Node> for Document {
    type Error = TalkDomainError;

    fn try_from(root: Node) -> Result<Self, Self::Error> {
        Self::from_root(root)
    }
}

impl From<Document> for Node {
    fn from(document: Document) -> Self {
        document.root
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, &self.root)
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    write!(f, "<{}", node.name)?;
    for (key, value) in &node.attributes {
        write!(f, " {key}=\"{}\"", escape(value))?;
    }
    if node.text.is_none() && node.children.is_empty() {
        return f.write_str("/>");
    }
    f.write_str(">")?;
    if let Some(text) = &node.text {
        f.write_str(&escape(text))?;
    }
    for child in &node.children {
        write_node(f, child)?;
    }
    write!(f, "</{}>", node.name)
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
