//! Re-entry stage detection (spec §4.6): when a shepherd starts (or
//! restarts after a daemon crash) it looks up whether a PR already links the
//! issue, so it can skip straight to Judge instead of re-running Builder.

use crate::models::{PullRequest, PR_PIPELINE_LABELS};
use crate::error::LoomError;
use crate::platform::github::GitHubFacade;

pub fn find_linked_pr(gh: &GitHubFacade, issue: u64) -> Result<Option<PullRequest>, LoomError> {
    for label in PR_PIPELINE_LABELS {
        for pr in gh.list_prs_by_label(label)? {
            if pr.closes_issue() == Some(issue) {
                return Ok(Some(pr));
            }
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NeedsBuilder,
    NeedsJudge,
}

pub fn detect_stage(gh: &GitHubFacade, issue: u64) -> Result<(Stage, Option<u64>), LoomError> {
    match find_linked_pr(gh, issue)? {
        Some(pr) => Ok((Stage::NeedsJudge, Some(pr.number))),
        None => Ok((Stage::NeedsBuilder, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_enum_distinguishes_builder_and_judge() {
        assert_ne!(Stage::NeedsBuilder, Stage::NeedsJudge);
    }
}
