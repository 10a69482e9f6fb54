//! Shared fixtures for the scenario tests in `spec.md` §8: a real temporary
//! git repository (the same `Command::new("git")` + `TempDir` pattern the
//! teacher's own `tests/*` helpers use) and a stub `gh` executable placed
//! first on `PATH`, since `GitHubFacade` shells out to the real `gh` binary
//! and the daemon/git/mux interfaces are the spec's declared external
//! collaborators rather than something this crate re-implements in-process.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Creates a throwaway git repository with one commit, suitable as a
/// `repo_root` for `GitFacade` calls.
pub fn create_temp_git_repo() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let run = |args: &[&str]| {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir.path())
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {args:?} failed");
    };
    run(&["init", "-q"]);
    run(&["config", "user.email", "loom-test@example.com"]);
    run(&["config", "user.name", "Loom Test"]);
    std::fs::write(dir.path().join("README.md"), "# test repo\n").unwrap();
    run(&["add", "."]);
    run(&["commit", "-q", "-m", "initial commit"]);
    dir
}

/// A handle that restores the prior `PATH` when dropped, so a fake `gh`
/// never leaks into a later test in the same process.
pub struct FakeGh {
    _bin_dir: TempDir,
    prior_path: String,
}

impl Drop for FakeGh {
    fn drop(&mut self) {
        std::env::set_var("PATH", &self.prior_path);
    }
}

/// Installs a stub `gh` script on `PATH` that dispatches on argv and prints
/// canned JSON, standing in for the real `gh` CLI the GitHub facade wraps.
/// `script_body` is shell run as the body of the stub's `main` (argv is
/// available as `$@`); a preamble extracts `$label` (the `--label` value, if
/// any) and `$number` (`$3`, the issue/PR number for `view`/`edit`/`merge`/
/// `comment` subcommands) so scripts can dispatch on `"$1 $2 $label"` without
/// re-deriving them each time.
pub fn install_fake_gh(script_body: &str) -> FakeGh {
    let bin_dir = TempDir::new().expect("tempdir");
    let script_path = bin_dir.path().join("gh");
    let preamble = r#"
label=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--label" ]; then label="$arg"; fi
  prev="$arg"
done
number="$3"
"#;
    std::fs::write(&script_path, format!("#!/bin/sh\n{preamble}\n{script_body}\n")).unwrap();
    let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(0o755);
    std::fs::set_permissions(&script_path, perms).unwrap();

    let prior_path = std::env::var("PATH").unwrap_or_default();
    let new_path = format!("{}:{}", bin_dir.path().display(), prior_path);
    std::env::set_var("PATH", new_path);
    FakeGh { _bin_dir: bin_dir, prior_path }
}

pub fn loom_dir(repo: &Path) -> PathBuf {
    repo.join(".loom")
}
