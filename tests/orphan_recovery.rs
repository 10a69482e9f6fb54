//! Daemon-level sweep (`spec.md` §4.9, scenario 5): an issue carrying
//! `loom:building` with no matching shepherd slot, and a shepherd slot whose
//! progress heartbeat has gone stale, both get reported as interventions and
//! — only when `recover` is true — actually repaired.

mod common;

use std::collections::BTreeSet;

use chrono::{Duration as ChronoDuration, Utc};
use loom::config::DaemonConfig;
use loom::models::{Issue, IssueState, ProgressFile};
use loom::platform::github::GitHubFacade;
use loom::scheduler::sweep::run_sweep;
use loom::store::StateStore;
use serial_test::serial;

fn building_issue(number: u64, updated_minutes_ago: i64) -> Issue {
    let now = Utc::now();
    Issue {
        number,
        title: format!("issue {number}"),
        state: IssueState::Open,
        labels: BTreeSet::from(["loom:building".to_string()]),
        created_at: now - ChronoDuration::hours(1),
        updated_at: now - ChronoDuration::minutes(updated_minutes_ago),
    }
}

#[test]
#[serial]
fn orphaned_building_issue_with_no_claiming_slot_is_restored() {
    let repo = common::create_temp_git_repo();
    let loom_dir = common::loom_dir(repo.path());
    let store = StateStore::new(&loom_dir);
    store.init("daemon-1", 2, Utc::now()).unwrap();

    let cfg = DaemonConfig::default();
    let issue = building_issue(9, 1);

    let _gh = common::install_fake_gh(
        r#"
case "$1 $2 $label" in
  "issue edit ")
    exit 0
    ;;
  "issue comment ")
    exit 0
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#,
    );
    let gh = GitHubFacade::new(None);

    let interventions = run_sweep(&gh, &store, &loom_dir, &cfg, &[issue], Utc::now(), true).unwrap();
    assert_eq!(interventions.len(), 1);
    assert!(interventions[0].indicators.iter().any(|i| i.contains("no matching shepherd slot")));

    let archive = glob::glob(&format!("{}/interventions/issue-9-*.json", loom_dir.display()))
        .unwrap()
        .filter_map(Result::ok)
        .count();
    assert_eq!(archive, 1);
}

#[test]
#[serial]
fn claimed_fresh_building_issue_is_left_alone() {
    let repo = common::create_temp_git_repo();
    let loom_dir = common::loom_dir(repo.path());
    let store = StateStore::new(&loom_dir);
    store.init("daemon-1", 1, Utc::now()).unwrap();

    let task_id = "abc1234";
    store.update(|mut s| {
        let slot = s.shepherds.get_mut("shepherd-1").unwrap();
        slot.status = loom::models::ShepherdStatus::Working;
        slot.issue = Some(9);
        slot.task_id = Some(task_id.to_string());
        s
    }).unwrap();
    store.write_progress(&ProgressFile::new(task_id, 9, Utc::now())).unwrap();

    let cfg = DaemonConfig::default();
    let issue = building_issue(9, 1);

    let _gh = common::install_fake_gh(
        r#"
case "$1 $2 $label" in
  "pr list loom:review-requested"|"pr list loom:changes-requested"|"pr list loom:pr")
    echo '[]'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#,
    );
    let gh = GitHubFacade::new(None);

    let interventions = run_sweep(&gh, &store, &loom_dir, &cfg, &[issue], Utc::now(), true).unwrap();
    assert!(interventions.is_empty(), "claimed, fresh, recently-updated issue should not trigger a sweep intervention");
}

#[test]
#[serial]
fn shepherd_with_stale_heartbeat_is_marked_errored_and_its_session_killed() {
    let repo = common::create_temp_git_repo();
    let loom_dir = common::loom_dir(repo.path());
    let store = StateStore::new(&loom_dir);
    store.init("daemon-1", 1, Utc::now()).unwrap();

    let task_id = "def5678";
    store.update(|mut s| {
        let slot = s.shepherds.get_mut("shepherd-1").unwrap();
        slot.status = loom::models::ShepherdStatus::Working;
        slot.issue = Some(4);
        slot.task_id = Some(task_id.to_string());
        s
    }).unwrap();

    let stale_heartbeat = Utc::now() - ChronoDuration::minutes(10);
    let mut progress = ProgressFile::new(task_id, 4, stale_heartbeat);
    progress.last_heartbeat = stale_heartbeat;
    store.write_progress(&progress).unwrap();

    let cfg = DaemonConfig::default();
    let _gh = common::install_fake_gh("exit 0\n");
    let gh = GitHubFacade::new(None);

    let interventions = run_sweep(&gh, &store, &loom_dir, &cfg, &[], Utc::now(), true).unwrap();
    assert_eq!(interventions.len(), 1);
    assert_eq!(interventions[0].agent_id, "shepherd-1");

    let state = store.read().unwrap();
    assert_eq!(state.shepherds["shepherd-1"].status, loom::models::ShepherdStatus::Errored);
}
