//! Behaviour tests for the agent engine fixpoint loop.

#[path = "agent_engine_steps/mod.rs"]
mod agent_engine_steps_defs;

use agent_engine_steps_defs::world::{EngineWorld, world};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/agent_engine.feature",
    name = "Agents fire in declaration order until the talk settles"
)]
#[tokio::test(flavor = "multi_thread")]
async fn agents_fire_in_order(world: EngineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/agent_engine.feature",
    name = "A pass without changes ends the run"
)]
#[tokio::test(flavor = "multi_thread")]
async fn quiet_pass_ends_run(world: EngineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/agent_engine.feature",
    name = "A failing agent is recorded once per message"
)]
#[tokio::test(flavor = "multi_thread")]
async fn failures_are_recorded_once(world: EngineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/agent_engine.feature",
    name = "An archived talk is deactivated"
)]
#[tokio::test(flavor = "multi_thread")]
async fn archived_talk_is_deactivated(world: EngineWorld) {
    let _ = world;
}
