//! Path queries over talk documents.
//!
//! The query language is a small XPath subset: absolute location paths made
//! of named (or `*`) steps, each optionally filtered by predicates such as
//! `[@id and not(started)]`, `[type='merge']` or `[not(shell) or shell/released]`.
//! Comparisons are existential, as in XPath: `a='x'` holds when any selected
//! `a` carries the text `x`.

use super::{Node, PathError};
use std::fmt;
use std::str::FromStr;

/// A parsed path query, reusable across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    text: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    test: NameTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn accepts(&self, node: &Node) -> bool {
        match self {
            Self::Any => true,
            Self::Named(name) => node.name() == name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Atom(Operand, Option<(Comparison, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Attribute(String),
    Text,
    Children(Vec<NameTest>),
}

impl PathQuery {
    /// Parses a query.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] when the text is not a well-formed absolute
    /// query.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let steps = Parser::new(text).query()?;
        Ok(Self {
            text: text.to_owned(),
            steps,
        })
    }

    /// Returns the query text as originally given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns child-index paths (relative to `root`) of every matching node,
    /// in document order.
    pub(crate) fn positions(&self, root: &Node) -> Vec<Vec<usize>> {
        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            return Vec::new();
        };
        if !first.test.accepts(root) || !first.predicates.iter().all(|expr| expr.holds(root)) {
            return Vec::new();
        }
        let mut current: Vec<(Vec<usize>, &Node)> = vec![(Vec::new(), root)];
        for step in steps {
            let mut next = Vec::new();
            for (position, node) in &current {
                for (index, child) in node.children().iter().enumerate() {
                    if step.test.accepts(child) && step.predicates.iter().all(|expr| expr.holds(child)) {
                        let mut path = position.clone();
                        path.push(index);
                        next.push((path, child));
                    }
                }
            }
            current = next;
        }
        current.into_iter().map(|(position, _)| position).collect()
    }
}

impl FromStr for PathQuery {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Expr {
    fn holds(&self, node: &Node) -> bool {
        match self {
            Self::And(left, right) => left.holds(node) && right.holds(node),
            Self::Or(left, right) => left.holds(node) || right.holds(node),
            Self::Not(inner) => !inner.holds(node),
            Self::Atom(operand, comparison) => {
                let values = operand.values(node);
                match comparison {
                    None => !values.is_empty(),
                    Some((Comparison::Equal, literal)) => values.iter().any(|value| *value == literal.as_str()),
                    Some((Comparison::NotEqual, literal)) => values.iter().any(|value| *value != literal.as_str()),
                }
            }
        }
    }
}

impl Operand {
    fn values<'a>(&self, node: &'a Node) -> Vec<&'a str> {
        match self {
            Self::Attribute(name) => node.attribute(name).into_iter().collect(),
            Self::Text => node.text().filter(|text| !text.is_empty()).into_iter().collect(),
            Self::Children(tests) => {
                let mut current = vec![node];
                for test in tests {
                    current = current
                        .into_iter()
                        .flat_map(|parent| parent.children().iter().filter(move |child| test.accepts(child)))
                        .collect();
                }
                current
                    .into_iter()
                    .map(|found| found.text().unwrap_or_default())
                    .collect()
            }
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    cursor: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            cursor: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> PathError {
        let offset = self
            .chars
            .get(self.cursor)
            .map_or(self.text.len(), |(offset, _)| *offset);
        PathError {
            query: self.text.to_owned(),
            offset,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.cursor).map(|(_, ch)| *ch)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars
            .get(self.cursor.saturating_add(ahead))
            .map(|(_, ch)| *ch)
    }

    fn bump(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_spaces();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), PathError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    fn query(mut self) -> Result<Vec<Step>, PathError> {
        let mut steps = Vec::new();
        self.skip_spaces();
        if self.peek() != Some('/') {
            return Err(self.error("query must be absolute"));
        }
        while self.eat('/') {
            steps.push(self.step()?);
        }
        self.skip_spaces();
        if self.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(steps)
    }

    fn step(&mut self) -> Result<Step, PathError> {
        let test = self.name_test()?;
        let mut predicates = Vec::new();
        while self.eat('[') {
            predicates.push(self.or_expr()?);
            self.expect(']')?;
        }
        Ok(Step { test, predicates })
    }

    fn name_test(&mut self) -> Result<NameTest, PathError> {
        self.skip_spaces();
        if self.peek() == Some('*') {
            self.bump();
            return Ok(NameTest::Any);
        }
        self.identifier().map(NameTest::Named)
    }

    fn identifier(&mut self) -> Result<String, PathError> {
        self.skip_spaces();
        let mut name = String::new();
        match self.peek() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                name.push(first);
                self.bump();
            }
            _ => return Err(self.error("expected a name")),
        }
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                name.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn keyword(&mut self, word: &str) -> bool {
        self.skip_spaces();
        let matches_word = word
            .chars()
            .enumerate()
            .all(|(offset, ch)| self.peek_at(offset) == Some(ch));
        let boundary = self
            .peek_at(word.chars().count())
            .is_none_or(|next| !(next.is_ascii_alphanumeric() || matches!(next, '-' | '_')));
        if matches_word && boundary {
            self.cursor = self.cursor.saturating_add(word.chars().count());
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Expr, PathError> {
        let mut left = self.and_expr()?;
        while self.keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, PathError> {
        let mut left = self.unary()?;
        while self.keyword("and") {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, PathError> {
        self.skip_spaces();
        if self.peek() == Some('(') {
            self.bump();
            let inner = self.or_expr()?;
            self.expect(')')?;
            return Ok(inner);
        }
        let checkpoint = self.cursor;
        if self.keyword("not") {
            if self.eat('(') {
                let inner = self.or_expr()?;
                self.expect(')')?;
                return Ok(Expr::Not(Box::new(inner)));
            }
            self.cursor = checkpoint;
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, PathError> {
        let operand = self.operand()?;
        self.skip_spaces();
        let comparison = if self.peek() == Some('!') && self.peek_at(1) == Some('=') {
            self.cursor = self.cursor.saturating_add(2);
            Some((Comparison::NotEqual, self.literal()?))
        } else if self.eat('=') {
            Some((Comparison::Equal, self.literal()?))
        } else {
            None
        };
        Ok(Expr::Atom(operand, comparison))
    }

    fn operand(&mut self) -> Result<Operand, PathError> {
        self.skip_spaces();
        if self.eat('@') {
            return self.identifier().map(Operand::Attribute);
        }
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
            self.bump();
            return Ok(Operand::Text);
        }
        let checkpoint = self.cursor;
        if self.keyword("text") {
            if self.eat('(') {
                self.expect(')')?;
                return Ok(Operand::Text);
            }
            self.cursor = checkpoint;
        }
        let mut tests = vec![self.name_test()?];
        while self.peek() == Some('/') {
            self.bump();
            tests.push(self.name_test()?);
        }
        Ok(Operand::Children(tests))
    }

    fn literal(&mut self) -> Result<String, PathError> {
        self.skip_spaces();
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted literal")),
        };
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(ch) if ch == quote => {
                    self.bump();
                    return Ok(value);
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
                None => return Err(self.error("unterminated literal")),
            }
        }
    }
}
