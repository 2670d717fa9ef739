//! Request script templates.

use super::error::AgentError;
use crate::shell::shell_escape;
use minijinja::{Environment, Value};
use serde_json::Map;
use std::collections::BTreeMap;

const MERGE: &str = r#"echo "merge of {{ args.head_branch }} into {{ args.base_branch | default("master") }} requested by {{ author }}"
git clone {{ args.repo | sh }} repo
cd repo
git checkout {{ args.base_branch | default("master") | sh }}
git fetch origin {{ args.head_branch | sh }}
git merge --no-ff FETCH_HEAD
{{ args.script | default("true") }}
git push origin {{ args.base_branch | default("master") | sh }}"#;

const DEPLOY: &str = r#"echo "deploy requested by {{ author }}"
git clone {{ args.repo | sh }} repo
cd repo
git checkout {{ args.branch | default("master") | sh }}
{{ args.script | default("true") }}"#;

const RELEASE: &str = r#"echo "release {{ args.tag }} requested by {{ author }}"
git clone {{ args.repo | sh }} repo
cd repo
git checkout {{ args.branch | default("master") | sh }}
{{ args.script | default("true") }}
git tag {{ args.tag | sh }}
git push origin {{ args.tag | sh }}"#;

/// Per-command script templates, rendered with `minijinja`.
///
/// Templates see `talk`, `id`, `type`, `author`, `container` and the `args`
/// map. The `sh` filter single-quotes a value for the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplates {
    templates: BTreeMap<String, String>,
}

impl Default for ScriptTemplates {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl ScriptTemplates {
    /// Built-in `merge`, `deploy` and `release` templates, overridden or
    /// extended by `overrides`.
    #[must_use]
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        let mut templates: BTreeMap<String, String> = [("merge", MERGE), ("deploy", DEPLOY), ("release", RELEASE)]
            .into_iter()
            .map(|(command, source)| (command.to_owned(), source.to_owned()))
            .collect();
        templates.extend(overrides);
        Self { templates }
    }

    /// Returns `true` when a template exists for `command`.
    #[must_use]
    pub fn knows(&self, command: &str) -> bool {
        self.templates.contains_key(command)
    }

    /// Renders the script for `command`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotImplemented`] for an unknown command and
    /// [`AgentError::Template`] when rendering fails.
    pub fn render(&self, command: &str, context: Map<String, serde_json::Value>) -> Result<String, AgentError> {
        let source = self
            .templates
            .get(command)
            .ok_or_else(|| AgentError::NotImplemented(command.to_owned()))?;
        let mut environment = Environment::new();
        environment.add_filter("sh", |value: Value| shell_escape(&value.to_string()));
        environment
            .render_str(source, context)
            .map_err(|error| AgentError::Template {
                command: command.to_owned(),
                reason: error.to_string(),
            })
    }
}
