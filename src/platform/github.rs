//! GitHub facade, backed by the `gh` CLI's JSON output (`gh issue list --json
//! ... --jq ...`), the same `Command::new("gh")` + `--json`/`--jq` pattern used
//! across the corpus for GitHub automation. A narrow typed surface, not a raw
//! client: exactly the operations spec §4.1 names.

use std::collections::BTreeSet;
use std::process::Command;

use chrono::Utc;
use serde::Deserialize;

use crate::error::{LoomError, Transience};
use crate::models::{Issue, IssueState, PrState, PullRequest};

#[derive(Clone)]
pub struct GitHubFacade {
    repo: Option<String>,
}

impl GitHubFacade {
    /// `repo` is `owner/name`; `None` lets `gh` infer it from the current
    /// directory's git remote, matching how `gh` is normally invoked.
    pub fn new(repo: Option<String>) -> Self {
        Self { repo }
    }

    fn repo_args(&self) -> Vec<&str> {
        match &self.repo {
            Some(r) => vec!["--repo", r],
            None => vec![],
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, LoomError> {
        let output = Command::new("gh").args(args).output().map_err(|e| {
            LoomError::external(format!("gh {}: {e}", args.join(" ")), Transience::Permanent)
        })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(LoomError::external(format!("gh {}: {stderr}", args.join(" ")), Transience::Transient))
        }
    }

    pub fn list_issues_by_label(&self, label: &str) -> Result<Vec<Issue>, LoomError> {
        let mut args = vec!["issue", "list", "--label", label, "--state", "open", "--json",
            "number,title,state,labels,createdAt,updatedAt", "--limit", "200"];
        args.extend(self.repo_args());
        let raw = self.run(&args)?;
        parse_issues(&raw)
    }

    pub fn list_prs_by_label(&self, label: &str) -> Result<Vec<PullRequest>, LoomError> {
        let mut args = vec!["pr", "list", "--label", label, "--state", "open", "--json",
            "number,headRefName,body,state,labels", "--limit", "200"];
        args.extend(self.repo_args());
        let raw = self.run(&args)?;
        parse_prs(&raw)
    }

    pub fn view_issue(&self, number: u64) -> Result<Issue, LoomError> {
        let number_str = number.to_string();
        let mut args = vec!["issue", "view", &number_str, "--json",
            "number,title,state,labels,createdAt,updatedAt"];
        args.extend(self.repo_args());
        let raw = self.run(&args)?;
        parse_one_issue(&raw)
    }

    pub fn view_pr(&self, number: u64) -> Result<PullRequest, LoomError> {
        let number_str = number.to_string();
        let mut args = vec!["pr", "view", &number_str, "--json",
            "number,headRefName,body,state,labels"];
        args.extend(self.repo_args());
        let raw = self.run(&args)?;
        parse_one_pr(&raw)
    }

    /// Atomic: a single `gh` invocation adds and removes labels together, so
    /// pipeline exclusivity never has an observable intermediate state.
    pub fn edit_labels(&self, target: Target, add: &[&str], remove: &[&str]) -> Result<(), LoomError> {
        if add.is_empty() && remove.is_empty() {
            return Ok(());
        }
        let (subcommand, number_str) = match target {
            Target::Issue(n) => ("issue", n.to_string()),
            Target::Pr(n) => ("pr", n.to_string()),
        };
        let mut args = vec![subcommand.to_string(), "edit".to_string(), number_str];
        for label in add {
            args.push("--add-label".to_string());
            args.push((*label).to_string());
        }
        for label in remove {
            args.push("--remove-label".to_string());
            args.push((*label).to_string());
        }
        if let Some(repo) = &self.repo {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).map(|_| ())
    }

    pub fn create_pr(&self, branch: &str, title: &str, body: &str, labels: &[&str]) -> Result<u64, LoomError> {
        let mut args = vec!["pr", "create", "--head", branch, "--title", title, "--body", body];
        for label in labels {
            args.push("--label");
            args.push(label);
        }
        args.extend(self.repo_args());
        let raw = self.run(&args)?;
        extract_pr_number_from_url(&raw)
    }

    pub fn merge_pr(&self, number: u64, squash: bool, delete_branch: bool) -> Result<(), LoomError> {
        let number_str = number.to_string();
        let mut args = vec!["pr".to_string(), "merge".to_string(), number_str];
        args.push(if squash { "--squash".to_string() } else { "--merge".to_string() });
        if delete_branch {
            args.push("--delete-branch".to_string());
        }
        if let Some(repo) = &self.repo {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).map(|_| ())
    }

    pub fn comment(&self, target: Target, body: &str) -> Result<(), LoomError> {
        let (subcommand, number_str) = match target {
            Target::Issue(n) => ("issue", n.to_string()),
            Target::Pr(n) => ("pr", n.to_string()),
        };
        let mut args = vec![subcommand, "comment", &number_str, "--body", body];
        args.extend(self.repo_args());
        self.run(&args).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Target {
    Issue(u64),
    Pr(u64),
}

#[derive(Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    state: String,
    labels: Vec<RawLabel>,
    #[serde(rename = "createdAt")]
    created_at: chrono::DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawPr {
    number: u64,
    #[serde(rename = "headRefName")]
    head_ref_name: String,
    #[serde(default)]
    body: String,
    state: String,
    labels: Vec<RawLabel>,
}

fn parse_issues(raw: &str) -> Result<Vec<Issue>, LoomError> {
    let items: Vec<RawIssue> = serde_json::from_str(raw)
        .map_err(|e| LoomError::external(format!("parse gh issue list: {e}"), Transience::Permanent))?;
    Ok(items.into_iter().map(raw_issue_into_issue).collect())
}

fn parse_one_issue(raw: &str) -> Result<Issue, LoomError> {
    let item: RawIssue = serde_json::from_str(raw)
        .map_err(|e| LoomError::external(format!("parse gh issue view: {e}"), Transience::Permanent))?;
    Ok(raw_issue_into_issue(item))
}

fn raw_issue_into_issue(item: RawIssue) -> Issue {
    Issue {
        number: item.number,
        title: item.title,
        state: if item.state.eq_ignore_ascii_case("open") {
            IssueState::Open
        } else {
            IssueState::Closed
        },
        labels: item.labels.into_iter().map(|l| l.name).collect::<BTreeSet<_>>(),
        created_at: item.created_at,
        updated_at: item.updated_at,
    }
}

fn parse_prs(raw: &str) -> Result<Vec<PullRequest>, LoomError> {
    let items: Vec<RawPr> = serde_json::from_str(raw)
        .map_err(|e| LoomError::external(format!("parse gh pr list: {e}"), Transience::Permanent))?;
    Ok(items.into_iter().map(raw_pr_into_pr).collect())
}

fn parse_one_pr(raw: &str) -> Result<PullRequest, LoomError> {
    let item: RawPr = serde_json::from_str(raw)
        .map_err(|e| LoomError::external(format!("parse gh pr view: {e}"), Transience::Permanent))?;
    Ok(raw_pr_into_pr(item))
}

fn raw_pr_into_pr(item: RawPr) -> PullRequest {
    let state = match item.state.to_ascii_uppercase().as_str() {
        "MERGED" => PrState::Merged,
        "CLOSED" => PrState::Closed,
        _ => PrState::Open,
    };
    PullRequest {
        number: item.number,
        head_branch: item.head_ref_name,
        body: item.body,
        state,
        labels: item.labels.into_iter().map(|l| l.name).collect::<BTreeSet<_>>(),
    }
}

fn extract_pr_number_from_url(raw: &str) -> Result<u64, LoomError> {
    let trimmed = raw.trim();
    trimmed
        .rsplit('/')
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| LoomError::external(format!("could not parse PR number from: {trimmed}"), Transience::Permanent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issue_list_json() {
        let raw = r#"[{"number":42,"title":"Add ratelimit docs","state":"OPEN","labels":[{"name":"loom:issue"}],"createdAt":"2026-01-01T00:00:00Z","updatedAt":"2026-01-01T00:00:00Z"}]"#;
        let issues = parse_issues(raw).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 42);
        assert!(issues[0].has_label("loom:issue"));
    }

    #[test]
    fn parses_pr_list_json() {
        let raw = r#"[{"number":9,"headRefName":"feature/issue-9","body":"Closes #9","state":"OPEN","labels":[{"name":"loom:changes-requested"}]}]"#;
        let prs = parse_prs(raw).unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].closes_issue(), Some(9));
    }

    #[test]
    fn extracts_pr_number_from_create_output() {
        assert_eq!(
            extract_pr_number_from_url("https://github.com/acme/repo/pull/57\n").unwrap(),
            57
        );
    }
}
