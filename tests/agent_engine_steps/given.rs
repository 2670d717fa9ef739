//! Given steps for agent engine scenarios.

use super::world::{EngineWorld, Failing, Idle, Marker, run_async};
use eyre::WrapErr;
use palaver::talk::domain::{RepoName, TalkName};
use palaver::talk::ports::Talks;
use rstest_bdd_macros::given;
use std::sync::Arc;

#[given(r#"a talk "{name}" in repository "{repo}""#)]
fn a_talk(world: &mut EngineWorld, name: String, repo: String) -> Result<(), eyre::Report> {
    let talk_name = TalkName::new(name).wrap_err("talk name")?;
    let repo_name = RepoName::new(repo).wrap_err("repository name")?;
    let number = run_async(world.talks.create(&repo_name, &talk_name)).wrap_err("create talk")?;
    world.talk = Some(run_async(world.talks.get(number)).wrap_err("open talk")?);
    Ok(())
}

#[given(r#"an agent that writes "{section}" once "{requires}" is present"#)]
fn gated_marker(world: &mut EngineWorld, section: String, requires: String) -> Result<(), eyre::Report> {
    let agent = Marker::new(&section, Some(&requires)).wrap_err("gated marker")?;
    world.agents.push(Arc::new(agent));
    Ok(())
}

#[given(r#"an agent that writes "{section}""#)]
fn marker(world: &mut EngineWorld, section: String) -> Result<(), eyre::Report> {
    let agent = Marker::new(&section, None).wrap_err("marker")?;
    world.agents.push(Arc::new(agent));
    Ok(())
}

#[given("an agent that never changes anything")]
fn idle(world: &mut EngineWorld) {
    world.agents.push(Arc::new(Idle));
}

#[given(r#"an agent that fails with "{message}""#)]
fn failing(world: &mut EngineWorld, message: String) {
    world.agents.push(Arc::new(Failing { message }));
}
