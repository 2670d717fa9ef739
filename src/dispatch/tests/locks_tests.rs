//! Marker exclusivity tests.

use crate::dispatch::TalkLocks;
use crate::talk::domain::TalkName;
use rstest::rstest;

fn talk(name: &str) -> TalkName {
    TalkName::new(name).expect("valid talk")
}

#[rstest]
fn a_held_marker_blocks_other_workers() {
    let locks = TalkLocks::new();
    let held = locks.try_acquire(&talk("alpha")).expect("free talk");

    assert!(locks.try_acquire(&talk("alpha")).is_none());
    assert!(locks.try_acquire(&talk("beta")).is_some());
    assert!(locks.is_held(held.talk()));
}

#[rstest]
fn dropping_the_marker_frees_the_talk() {
    let locks = TalkLocks::new();
    drop(locks.try_acquire(&talk("alpha")).expect("free talk"));

    let again = locks.try_acquire(&talk("alpha"));

    assert!(again.is_some());
}

#[rstest]
fn clones_share_markers() {
    let locks = TalkLocks::new();
    let shared = locks.clone();
    let _held = locks.try_acquire(&talk("alpha")).expect("free talk");

    assert!(shared.is_held(&talk("alpha")));
    assert!(shared.try_acquire(&talk("alpha")).is_none());
}
