//! Agents that open and close requests.

use super::{field, parse_time, section, talk_name};
use crate::agent::error::AgentError;
use crate::agent::ports::{Agent, preconditions};
use crate::agent::templates::ScriptTemplates;
use crate::provision::container_name;
use crate::talk::domain::{Document, Patch, PathError, PathQuery};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Turns a fresh request into a daemon script.
#[derive(Debug)]
pub struct StartsRequest {
    templates: ScriptTemplates,
    queries: Vec<PathQuery>,
}

impl StartsRequest {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in precondition fails to parse.
    pub fn new(templates: ScriptTemplates) -> Result<Self, PathError> {
        Ok(Self {
            templates,
            queries: preconditions(&[
                "/talk/request[@id and type and not(success) and not(cancel)]",
                "/talk[not(daemon)]",
            ])?,
        })
    }
}

#[async_trait]
impl Agent for StartsRequest {
    fn name(&self) -> &'static str {
        "starts-request"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let request = section(document, "request")?;
        let id = request
            .attribute("id")
            .ok_or_else(|| AgentError::Malformed("request has no id".to_owned()))?;
        let kind = field(request, "type")?;
        let talk = talk_name(document)?;
        let args: Map<String, Value> = request
            .child("args")
            .map(|args| {
                args.children_named("arg")
                    .filter_map(|arg| {
                        arg.attribute("name").map(|name| {
                            (name.to_owned(), Value::String(arg.text().unwrap_or_default().to_owned()))
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let mut context = Map::new();
        context.insert("talk".to_owned(), Value::String(talk.to_string()));
        context.insert("id".to_owned(), Value::String(id.to_owned()));
        context.insert("type".to_owned(), Value::String(kind.to_owned()));
        context.insert(
            "author".to_owned(),
            Value::String(request.child_text("author").unwrap_or_default().to_owned()),
        );
        context.insert("container".to_owned(), Value::String(container_name(&talk)));
        context.insert("args".to_owned(), Value::Object(args));
        let script = self.templates.render(kind, context)?;
        tracing::info!(talk = %talk, request = id, kind, "request started");
        Ok(Patch::new()
            .add("daemon")
            .attr("id", id)
            .add("title")
            .set(kind)
            .up()
            .add("script")
            .set(script))
    }
}

/// Closes a cancelled request whose daemon never started.
#[derive(Debug)]
pub struct CancelsRequest {
    queries: Vec<PathQuery>,
    unstarted: PathQuery,
    request: PathQuery,
}

impl CancelsRequest {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in query fails to parse.
    pub fn new() -> Result<Self, PathError> {
        Ok(Self {
            queries: preconditions(&[
                "/talk/request[cancel and not(success)]",
                "/talk[not(daemon/started)]",
            ])?,
            unstarted: PathQuery::parse("/talk/daemon[not(started)]")?,
            request: PathQuery::parse("/talk/request")?,
        })
    }
}

#[async_trait]
impl Agent for CancelsRequest {
    fn name(&self) -> &'static str {
        "cancels-request"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        tracing::info!(talk = ?document.talk_name(), "request cancelled before start");
        Ok(Patch::new()
            .xpath(&self.unstarted)
            .remove()
            .xpath(&self.request)
            .strict(1)
            .add("success")
            .set("false"))
    }
}

/// Closes the request once its daemon has ended.
#[derive(Debug)]
pub struct EndsRequest {
    queries: Vec<PathQuery>,
    request: PathQuery,
}

impl EndsRequest {
    /// Creates the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if a built-in query fails to parse.
    pub fn new() -> Result<Self, PathError> {
        Ok(Self {
            queries: preconditions(&["/talk/daemon[ended and code]", "/talk/request[not(success)]"])?,
            request: PathQuery::parse("/talk/request")?,
        })
    }
}

#[async_trait]
impl Agent for EndsRequest {
    fn name(&self) -> &'static str {
        "ends-request"
    }

    fn preconditions(&self) -> &[PathQuery] {
        &self.queries
    }

    async fn process(&self, document: &Document) -> Result<Patch, AgentError> {
        let daemon = section(document, "daemon")?;
        let code = field(daemon, "code")?.trim();
        let success = code == "0";
        let msec = match (
            daemon.child_text("started").and_then(parse_time),
            daemon.child_text("ended").and_then(parse_time),
        ) {
            (Some(started), Some(ended)) => ended.signed_duration_since(started).num_milliseconds().max(0),
            _ => 0,
        };
        tracing::info!(talk = ?document.talk_name(), code, success, msec, "request finished");
        Ok(Patch::new()
            .xpath(&self.request)
            .strict(1)
            .add("success")
            .set(success.to_string())
            .up()
            .add("msec")
            .set(msec.to_string()))
    }
}

