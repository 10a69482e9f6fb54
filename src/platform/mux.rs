//! Terminal multiplexer facade, backed by the `tmux` CLI — the same
//! `Command::new("tmux")` style the teacher's tmux backend uses, narrowed to
//! the operations the spec calls out: create detached session, pipe pane to
//! file, send keystrokes, capture pane, list panes with PIDs, kill session,
//! check existence.

use std::path::Path;
use std::process::Command;

use shell_escape::escape;

use crate::error::{LoomError, Transience};

pub struct Mux;

fn run(args: &[&str]) -> Result<std::process::Output, LoomError> {
    Command::new("tmux").args(args).output().map_err(|e| {
        LoomError::external(format!("tmux {}: {e}", args.join(" ")), Transience::Permanent)
    })
}

fn ok_or_external(output: std::process::Output, context: &str) -> Result<String, LoomError> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(LoomError::external(format!("{context}: {stderr}"), Transience::Transient))
    }
}

impl Mux {
    pub fn has_session(name: &str) -> bool {
        Command::new("tmux")
            .args(["has-session", "-t", name])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Create a detached session named `name` in `cwd` with the given environment
    /// variables set before the shell starts.
    pub fn new_detached(name: &str, cwd: &Path, env: &[(&str, &str)]) -> Result<(), LoomError> {
        let cwd_str = cwd.to_string_lossy();
        let output = run(&["new-session", "-d", "-s", name, "-c", &cwd_str])?;
        ok_or_external(output, "tmux new-session")?;
        for (key, value) in env {
            let output = run(&["set-environment", "-t", name, key, value])?;
            ok_or_external(output, "tmux set-environment")?;
        }
        Ok(())
    }

    /// Pipe the pane's output to `path`, truncating any prior pipe first so log
    /// rotation (caller renames the old file away beforehand) starts clean.
    pub fn pipe_pane_to_file(name: &str, path: &Path) -> Result<(), LoomError> {
        let path_str = path.to_string_lossy();
        let cmd = format!("cat >> {}", escape(path_str));
        let output = run(&["pipe-pane", "-t", name, "-o", &cmd])?;
        ok_or_external(output, "tmux pipe-pane").map(|_| ())
    }

    /// Send a line of input followed by Enter, exactly as a user typing then
    /// pressing return.
    pub fn send_keys(name: &str, line: &str) -> Result<(), LoomError> {
        let output = run(&["send-keys", "-t", name, "-l", line])?;
        ok_or_external(output, "tmux send-keys (literal)")?;
        let output = run(&["send-keys", "-t", name, "Enter"])?;
        ok_or_external(output, "tmux send-keys (Enter)").map(|_| ())
    }

    /// Send a single control key (e.g. bare "Enter", "1") without the literal flag,
    /// used for interactive-prompt resolution.
    pub fn send_key(name: &str, key: &str) -> Result<(), LoomError> {
        let output = run(&["send-keys", "-t", name, key])?;
        ok_or_external(output, "tmux send-keys").map(|_| ())
    }

    pub fn capture_pane(name: &str) -> Result<String, LoomError> {
        let output = run(&["capture-pane", "-t", name, "-p", "-S", "-200"])?;
        ok_or_external(output, "tmux capture-pane")
    }

    /// List PIDs of processes running in each pane of the session (there is one
    /// pane per worker session in this design, but tmux can report more than one
    /// row if a user manually splits it).
    pub fn list_panes(name: &str) -> Result<Vec<u32>, LoomError> {
        let output = run(&["list-panes", "-t", name, "-F", "#{pane_pid}"])?;
        let text = ok_or_external(output, "tmux list-panes")?;
        Ok(text.lines().filter_map(|l| l.trim().parse().ok()).collect())
    }

    pub fn kill_session(name: &str) -> Result<(), LoomError> {
        if !Self::has_session(name) {
            return Ok(());
        }
        let output = run(&["kill-session", "-t", name])?;
        ok_or_external(output, "tmux kill-session").map(|_| ())
    }
}
