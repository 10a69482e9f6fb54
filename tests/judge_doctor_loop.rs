//! Judge/Doctor phase contracts (`spec.md` §4.5, scenario 2): `check_judge`
//! is satisfied once a PR carries `loom:pr` or `loom:changes-requested`, and
//! `check_doctor` is satisfied once a PR is back at `loom:review-requested`.
//! Neither contract has a recovery step — both are pure label observations.

mod common;

use loom::phase::contracts::{check_doctor, check_judge, ContractOutcome};
use loom::platform::github::GitHubFacade;
use serial_test::serial;

fn pr_json(labels: &str) -> String {
    format!(
        r#"{{"number":12,"headRefName":"feature/issue-3","body":"Closes #3","state":"OPEN","labels":[{labels}]}}"#
    )
}

#[test]
#[serial]
fn judge_satisfied_once_doctor_hands_pr_back_as_loom_pr() {
    let _repo = common::create_temp_git_repo();
    let body = pr_json(r#"{"name":"loom:pr"}"#);
    let _gh = common::install_fake_gh(&format!(
        r#"
case "$1 $2 $label" in
  "pr view ")
    echo '{body}'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#
    ));
    let gh = GitHubFacade::new(None);
    let outcome = check_judge(&gh, 12, true).unwrap();
    assert_eq!(outcome, ContractOutcome::Satisfied);
}

#[test]
#[serial]
fn judge_satisfied_when_changes_were_requested() {
    let _repo = common::create_temp_git_repo();
    let body = pr_json(r#"{"name":"loom:changes-requested"}"#);
    let _gh = common::install_fake_gh(&format!(
        r#"
case "$1 $2 $label" in
  "pr view ")
    echo '{body}'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#
    ));
    let gh = GitHubFacade::new(None);
    let outcome = check_judge(&gh, 12, true).unwrap();
    assert_eq!(outcome, ContractOutcome::Satisfied);
}

#[test]
#[serial]
fn judge_pending_while_pr_still_carries_review_requested() {
    let _repo = common::create_temp_git_repo();
    let body = pr_json(r#"{"name":"loom:review-requested"}"#);
    let _gh = common::install_fake_gh(&format!(
        r#"
case "$1 $2 $label" in
  "pr view ")
    echo '{body}'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#
    ));
    let gh = GitHubFacade::new(None);
    let outcome = check_judge(&gh, 12, false).unwrap();
    assert_eq!(outcome, ContractOutcome::Pending);
}

#[test]
#[serial]
fn doctor_satisfied_once_pr_is_back_at_review_requested() {
    let _repo = common::create_temp_git_repo();
    let body = pr_json(r#"{"name":"loom:review-requested"}"#);
    let _gh = common::install_fake_gh(&format!(
        r#"
case "$1 $2 $label" in
  "pr view ")
    echo '{body}'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#
    ));
    let gh = GitHubFacade::new(None);
    let outcome = check_doctor(&gh, 12, true).unwrap();
    assert_eq!(outcome, ContractOutcome::Satisfied);
}

#[test]
#[serial]
fn doctor_pending_while_the_doctor_worker_is_still_running() {
    let _repo = common::create_temp_git_repo();
    let body = pr_json(r#"{"name":"loom:changes-requested"}"#);
    let _gh = common::install_fake_gh(&format!(
        r#"
case "$1 $2 $label" in
  "pr view ")
    echo '{body}'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#
    ));
    let gh = GitHubFacade::new(None);
    let outcome = check_doctor(&gh, 12, false).unwrap();
    assert_eq!(outcome, ContractOutcome::Pending);
}
