//! Git facade, backed by the `git` CLI, in the same `Command::new("git")
//! .args([...]).current_dir(repo_root)` style the teacher's `git::worktree`
//! and `git::branch` modules use throughout.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{LoomError, Transience};
use crate::models::Worktree;

pub struct GitFacade;

fn run(repo_root: &Path, args: &[&str]) -> Result<std::process::Output, LoomError> {
    Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .map_err(|e| LoomError::external(format!("git {}: {e}", args.join(" ")), Transience::Permanent))
}

fn ok_or_external(output: std::process::Output, context: &str) -> Result<String, LoomError> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(LoomError::external(format!("{context}: {stderr}"), Transience::Transient))
    }
}

impl GitFacade {
    /// Create (or reuse, if already present and valid) a worktree for `issue`
    /// at `.loom/worktrees/issue-<N>` on branch `feature/issue-<N>`.
    pub fn ensure_worktree(repo_root: &Path, loom_dir: &Path, issue: u64) -> Result<Worktree, LoomError> {
        let path = Worktree::for_issue(loom_dir, issue);
        let branch = Worktree::branch_name(issue);

        if path.exists() {
            return Ok(Worktree {
                issue_number: issue,
                path,
                branch,
                marker: None,
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoomError::external(format!("mkdir {}: {e}", parent.display()), Transience::Transient)
            })?;
        }

        let path_str = path.to_string_lossy().to_string();
        let output = run(repo_root, &["worktree", "add", "-b", &branch, &path_str])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("already exists") {
                // Stale branch from a prior crashed run: drop it and retry once,
                // so the worktree always comes up on the branch we expect.
                let _ = run(repo_root, &["branch", "-D", &branch]);
                let retry = run(repo_root, &["worktree", "add", "-b", &branch, &path_str])?;
                ok_or_external(retry, "git worktree add (after branch cleanup)")?;
            } else {
                return Err(LoomError::external(
                    format!("git worktree add: {stderr}"),
                    Transience::Transient,
                ));
            }
        }

        Ok(Worktree {
            issue_number: issue,
            path,
            branch,
            marker: None,
        })
    }

    pub fn status(worktree_path: &Path) -> Result<String, LoomError> {
        let output = run(worktree_path, &["status", "--porcelain"])?;
        ok_or_external(output, "git status")
    }

    /// True if the worktree has changes beyond the `.loom-in-use` marker and
    /// other infra files — the Builder recovery check from spec §4.5.
    pub fn has_substantive_changes(worktree_path: &Path) -> Result<bool, LoomError> {
        let status = Self::status(worktree_path)?;
        Ok(status.lines().any(|line| {
            let path = line.get(3..).unwrap_or("");
            path != ".loom-in-use" && !path.is_empty()
        }))
    }

    pub fn commit(worktree_path: &Path, message: &str) -> Result<(), LoomError> {
        let add = run(worktree_path, &["add", "-A"])?;
        ok_or_external(add, "git add")?;
        let commit = run(worktree_path, &["commit", "-m", message])?;
        ok_or_external(commit, "git commit").map(|_| ())
    }

    pub fn push(worktree_path: &Path, branch: &str, set_upstream: bool) -> Result<(), LoomError> {
        let args: Vec<&str> = if set_upstream {
            vec!["push", "-u", "origin", branch]
        } else {
            vec!["push", "origin", branch]
        };
        let output = run(worktree_path, &args)?;
        ok_or_external(output, "git push").map(|_| ())
    }

    pub fn remove_worktree(repo_root: &Path, worktree_path: &Path, force: bool) -> Result<(), LoomError> {
        let path_str = worktree_path.to_string_lossy().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        let output = run(repo_root, &args)?;
        ok_or_external(output, "git worktree remove").map(|_| ())
    }

    pub fn delete_branch(repo_root: &Path, branch: &str) -> Result<(), LoomError> {
        let output = run(repo_root, &["branch", "-D", branch])?;
        ok_or_external(output, "git branch -D").map(|_| ())
    }

    pub fn current_branch(worktree_path: &Path) -> Result<String, LoomError> {
        let output = run(worktree_path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        ok_or_external(output, "git rev-parse").map(|s| s.trim().to_string())
    }
}

/// `.loom/worktrees/issue-<N>` path helper re-exported for callers that only
/// have `loom_dir` and `issue`, without constructing a whole `Worktree`.
pub fn worktree_path(loom_dir: &Path, issue: u64) -> PathBuf {
    Worktree::for_issue(loom_dir, issue)
}
