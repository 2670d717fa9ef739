//! Then steps for agent engine scenarios.

use super::world::{EngineWorld, run_async};
use eyre::WrapErr;
use palaver::agent::Outcome;
use palaver::talk::ports::Talk;
use rstest_bdd_macros::then;

#[then(r#"the agents fired in order "{order}""#)]
fn fired_in_order(world: &EngineWorld, order: String) -> Result<(), eyre::Report> {
    let expected: Vec<&str> = order.split(',').map(str::trim).collect();
    let report = world.last_report()?;
    if report.fired != expected {
        return Err(eyre::eyre!("expected {expected:?}, fired {:?}", report.fired));
    }
    Ok(())
}

#[then("no agent fired")]
fn nothing_fired(world: &EngineWorld) -> Result<(), eyre::Report> {
    let report = world.last_report()?;
    if !report.fired.is_empty() {
        return Err(eyre::eyre!("unexpected firings: {:?}", report.fired));
    }
    Ok(())
}

#[then("the run settled after {passes:usize} passes")]
fn settled_after(world: &EngineWorld, passes: usize) -> Result<(), eyre::Report> {
    let report = world.last_report()?;
    if report.outcome != Outcome::Settled || report.passes != passes {
        return Err(eyre::eyre!(
            "expected settled after {passes} passes, got {:?} after {}",
            report.outcome,
            report.passes
        ));
    }
    Ok(())
}

#[then(r#"the talk records {count:usize} error from "{agent}""#)]
fn records_errors(world: &EngineWorld, count: usize, agent: String) -> Result<(), eyre::Report> {
    let document = run_async(world.talk()?.read()).wrap_err("read talk")?;
    let found = document.section("errors").map_or(0, |errors| {
        errors
            .children_named("error")
            .filter(|error| error.attribute("agent") == Some(agent.as_str()))
            .count()
    });
    if found != count {
        return Err(eyre::eyre!("expected {count} errors from {agent}, found {found}"));
    }
    Ok(())
}

#[then("the talk is no longer active")]
fn talk_inactive(world: &EngineWorld) -> Result<(), eyre::Report> {
    let report = world.last_report()?;
    let active = run_async(world.talk()?.is_active()).wrap_err("read activity")?;
    if active || !report.deactivated {
        return Err(eyre::eyre!("talk is still active"));
    }
    Ok(())
}

#[then("running the engine again leaves the talk untouched")]
fn rerun_is_inert(world: &EngineWorld) -> Result<(), eyre::Report> {
    let talk = world.talk()?;
    let before = run_async(talk.read()).wrap_err("read talk")?;
    let report = run_async(world.engine().run(talk.as_ref())).wrap_err("rerun engine")?;
    let after = run_async(talk.read()).wrap_err("read talk")?;
    if report.outcome != Outcome::Inactive || before != after {
        return Err(eyre::eyre!("inactive talk changed: {:?}", report.outcome));
    }
    Ok(())
}
