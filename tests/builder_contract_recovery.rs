//! Builder phase contract (`spec.md` §4.5): the PR-linkage check and its two
//! recovery branches — auto-commit-and-open-a-PR when the worker left
//! substantive changes, and remove-the-stale-worktree when it didn't.

mod common;

use std::process::Command;

use loom::phase::contracts::{check_builder, ContractOutcome};
use loom::platform::github::GitHubFacade;
use serial_test::serial;

fn git(repo: &std::path::Path, args: &[&str]) {
    let status = Command::new("git").args(args).current_dir(repo).status().unwrap();
    assert!(status.success(), "git {args:?} failed");
}

#[test]
#[serial]
fn satisfied_when_linked_pr_already_carries_review_requested() {
    let repo = common::create_temp_git_repo();
    let _gh = common::install_fake_gh(
        r#"
case "$1 $2 $label" in
  "pr list loom:review-requested")
    echo '[{"number":9,"headRefName":"feature/issue-7","body":"Closes #7","state":"OPEN","labels":[{"name":"loom:review-requested"}]}]'
    ;;
  "pr list loom:changes-requested"|"pr list loom:pr"|"pr list loom:treating")
    echo '[]'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#,
    );
    let gh = GitHubFacade::new(None);
    let outcome = check_builder(&gh, 7, repo.path(), repo.path(), "feature/issue-7", true).unwrap();
    assert_eq!(outcome, ContractOutcome::Satisfied);
}

#[test]
#[serial]
fn recovers_by_adding_missing_label_when_pr_exists_unlabeled() {
    let repo = common::create_temp_git_repo();
    let _gh = common::install_fake_gh(
        r#"
case "$1 $2 $label" in
  "pr list loom:review-requested"|"pr list loom:changes-requested"|"pr list loom:pr")
    echo '[]'
    ;;
  "pr list loom:treating")
    echo '[{"number":9,"headRefName":"feature/issue-7","body":"Closes #7","state":"OPEN","labels":[]}]'
    ;;
  "pr edit ")
    exit 0
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#,
    );
    let gh = GitHubFacade::new(None);
    let outcome = check_builder(&gh, 7, repo.path(), repo.path(), "feature/issue-7", false).unwrap();
    assert_eq!(outcome, ContractOutcome::Recovered);
}

#[test]
#[serial]
fn opens_a_pr_from_substantive_uncommitted_changes_when_none_exists() {
    let repo = common::create_temp_git_repo();
    // A bare "origin" so `git push -u origin <branch>` has somewhere to land.
    let origin = tempfile::TempDir::new().unwrap();
    git(origin.path(), &["init", "-q", "--bare"]);
    git(repo.path(), &["remote", "add", "origin", origin.path().to_str().unwrap()]);

    std::fs::write(repo.path().join("fix.rs"), "// a real fix\n").unwrap();
    git(repo.path(), &["checkout", "-b", "feature/issue-7"]);

    let _gh = common::install_fake_gh(
        r#"
case "$1 $2 $label" in
  "pr list loom:review-requested"|"pr list loom:changes-requested"|"pr list loom:pr"|"pr list loom:treating")
    echo '[]'
    ;;
  "pr create loom:review-requested")
    echo 'https://github.com/acme/repo/pull/57'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#,
    );
    let gh = GitHubFacade::new(None);
    let outcome = check_builder(&gh, 7, repo.path(), repo.path(), "feature/issue-7", false).unwrap();
    assert_eq!(outcome, ContractOutcome::Recovered);
}

#[test]
#[serial]
fn removes_stale_worktree_when_builder_left_no_changes() {
    let repo = common::create_temp_git_repo();
    let worktree_path = repo.path().join(".loom/worktrees/issue-7");
    std::fs::create_dir_all(worktree_path.parent().unwrap()).unwrap();
    git(repo.path(), &["worktree", "add", "-b", "feature/issue-7", worktree_path.to_str().unwrap()]);
    assert!(worktree_path.exists());

    let _gh = common::install_fake_gh(
        r#"
case "$1 $2 $label" in
  "pr list loom:review-requested"|"pr list loom:changes-requested"|"pr list loom:pr"|"pr list loom:treating")
    echo '[]'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#,
    );
    let gh = GitHubFacade::new(None);
    let outcome = check_builder(&gh, 7, repo.path(), &worktree_path, "feature/issue-7", false).unwrap();
    assert!(matches!(outcome, ContractOutcome::Failed(_)));
    assert!(!worktree_path.exists(), "stale worktree should have been removed");
}

#[test]
#[serial]
fn check_only_never_mutates_state() {
    let repo = common::create_temp_git_repo();
    let worktree_path = repo.path().join(".loom/worktrees/issue-7");
    std::fs::create_dir_all(worktree_path.parent().unwrap()).unwrap();
    git(repo.path(), &["worktree", "add", "-b", "feature/issue-7", worktree_path.to_str().unwrap()]);

    let _gh = common::install_fake_gh(
        r#"
case "$1 $2 $label" in
  "pr list loom:review-requested"|"pr list loom:changes-requested"|"pr list loom:pr"|"pr list loom:treating")
    echo '[]'
    ;;
  *) echo "unexpected invocation: $*" >&2; exit 1 ;;
esac
"#,
    );
    let gh = GitHubFacade::new(None);
    let outcome = check_builder(&gh, 7, repo.path(), &worktree_path, "feature/issue-7", true).unwrap();
    assert_eq!(outcome, ContractOutcome::Pending);
    assert!(worktree_path.exists(), "check-only must not clean up the worktree (spec §9)");
}
