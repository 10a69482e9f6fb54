use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head_branch: String,
    pub body: String,
    pub state: PrState,
    pub labels: BTreeSet<String>,
}

impl PullRequest {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Extract the issue number this PR closes via `feature/issue-<N>` branch
    /// naming (authoritative) or a `Closes/Fixes/Resolves #<N>` keyword in the
    /// body (fallback). Design choice from spec §9 Open Questions: branch-first,
    /// keyword-fallback.
    pub fn closes_issue(&self) -> Option<u64> {
        if let Some(rest) = self.head_branch.strip_prefix("feature/issue-") {
            if let Ok(n) = rest.parse() {
                return Some(n);
            }
        }
        closes_keyword_issue(&self.body)
    }
}

fn closes_keyword_issue(body: &str) -> Option<u64> {
    let lower = body.to_ascii_lowercase();
    for keyword in ["closes #", "fixes #", "resolves #"] {
        if let Some(idx) = lower.find(keyword) {
            let rest = &body[idx + keyword.len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = digits.parse() {
                return Some(n);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(branch: &str, body: &str) -> PullRequest {
        PullRequest {
            number: 1,
            head_branch: branch.into(),
            body: body.into(),
            state: PrState::Open,
            labels: BTreeSet::new(),
        }
    }

    #[test]
    fn branch_name_is_authoritative() {
        let p = pr("feature/issue-42", "unrelated text, Closes #99");
        assert_eq!(p.closes_issue(), Some(42));
    }

    #[test]
    fn keyword_fallback_when_branch_does_not_match() {
        let p = pr("some-other-branch", "This Fixes #7 nicely");
        assert_eq!(p.closes_issue(), Some(7));
    }

    #[test]
    fn neither_present_returns_none() {
        let p = pr("some-other-branch", "no keyword here");
        assert_eq!(p.closes_issue(), None);
    }
}
