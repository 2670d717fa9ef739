//! When steps for agent engine scenarios.

use super::world::{EngineWorld, run_async};
use rstest_bdd_macros::when;

#[when("the engine runs over the talk")]
fn engine_runs(world: &mut EngineWorld) -> Result<(), eyre::Report> {
    let talk = world.talk()?.clone();
    let report = run_async(world.engine().run(talk.as_ref()));
    world.reports.push(report);
    Ok(())
}
