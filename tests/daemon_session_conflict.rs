//! Scenario 4 (`spec.md` §8): a second daemon taking over `daemon-state.json`
//! must cause the first daemon's next `ValidateOwnership` check to fail, and
//! `Init` must archive the superseded state rather than clobber it silently.

mod common;

use chrono::Utc;
use loom::store::StateStore;

#[test]
fn second_daemon_takeover_invalidates_first_daemons_ownership() {
    let repo = common::create_temp_git_repo();
    let loom_dir = common::loom_dir(repo.path());
    let store = StateStore::new(&loom_dir);

    let daemon_a = "20260101T000000-111";
    store.init(daemon_a, 3, Utc::now()).unwrap();
    assert!(store.validate_ownership(daemon_a));

    // Daemon B starts against the same .loom directory.
    let daemon_b = "20260101T000500-222";
    store.init(daemon_b, 3, Utc::now()).unwrap();

    // Daemon A's next iteration observes the takeover and must exit.
    assert!(!store.validate_ownership(daemon_a));
    assert!(store.validate_ownership(daemon_b));

    // The superseded state was archived, not discarded.
    let archives = glob::glob(&format!("{}/daemon-state-*.json", loom_dir.display()))
        .unwrap()
        .filter_map(Result::ok)
        .count();
    assert_eq!(archives, 1);
}

#[test]
fn reinit_with_same_session_id_is_a_no_op_read() {
    let repo = common::create_temp_git_repo();
    let loom_dir = common::loom_dir(repo.path());
    let store = StateStore::new(&loom_dir);

    store.init("session-1", 3, Utc::now()).unwrap();
    store.update(|mut s| {
        s.iteration = 41;
        s
    }).unwrap();

    // A restart with the same session id must not wipe iteration progress.
    let reinit = store.init("session-1", 3, Utc::now()).unwrap();
    assert_eq!(reinit.iteration, 41);
}
