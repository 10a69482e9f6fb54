//! Process tree inspection and control.
//!
//! `is_alive` uses `libc::kill(pid, 0)` directly to avoid spawning a subprocess,
//! the same technique the teacher's original `process` module used. Descendant
//! enumeration and orphan sweeping walk `/proc` (DFS child enumeration), since
//! this daemon only targets Linux terminal-multiplexer hosts.

use std::collections::HashMap;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use regex::Regex;

use crate::error::{LoomError, Transience};

pub struct ProcessTree;

impl ProcessTree {
    /// Is a process with the given PID alive (and signalable by us)?
    pub fn is_alive(pid: u32) -> bool {
        match i32::try_from(pid) {
            Ok(pid_i32) => {
                // SAFETY: signal 0 only probes existence, it delivers nothing.
                let result = unsafe { libc::kill(pid_i32, 0) };
                result == 0
            }
            Err(_) => false,
        }
    }

    /// Send `signal` to `pid`.
    pub fn kill(pid: u32, sig: Signal) -> Result<(), LoomError> {
        signal::kill(Pid::from_raw(pid as i32), sig).map_err(|e| {
            if e == nix::errno::Errno::ESRCH {
                LoomError::NotFound(format!("pid {pid}"))
            } else {
                LoomError::external(format!("kill({pid}, {sig:?}): {e}"), Transience::Transient)
            }
        })
    }

    /// DFS enumeration of all descendants of `pid` by scanning `/proc/*/stat`
    /// for parent PIDs. Returns an empty list (not an error) if `/proc` is
    /// unavailable or the process has already exited.
    pub fn list_descendants(pid: u32) -> Vec<u32> {
        let children_by_parent = build_parent_index();
        let mut out = Vec::new();
        let mut stack = vec![pid];
        while let Some(p) = stack.pop() {
            if let Some(children) = children_by_parent.get(&p) {
                for &child in children {
                    out.push(child);
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Kill the process tree rooted at `pid`, depth-first, leaves first: SIGTERM,
    /// wait `grace`, then SIGKILL survivors. `force` skips the grace step.
    pub fn kill_tree(pid: u32, grace: std::time::Duration, force: bool) {
        let mut all = Self::list_descendants(pid);
        all.push(pid);
        // Kill deepest descendants first so a parent doesn't reap a child into
        // a zombie we then fail to signal.
        all.reverse();

        if !force {
            for &p in &all {
                let _ = Self::kill(p, Signal::SIGTERM);
            }
            std::thread::sleep(grace);
        }
        for &p in &all {
            if Self::is_alive(p) {
                let _ = Self::kill(p, Signal::SIGKILL);
            }
        }
    }

    /// Kill any process matching `pattern` in its command line whose controlling
    /// TTY is `??` (detached / orphaned from its terminal).
    pub fn sweep_orphans_matching(pattern: &Regex) -> Vec<u32> {
        let mut killed = Vec::new();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return killed;
        };
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(cmdline) = std::fs::read_to_string(entry.path().join("cmdline")) else {
                continue;
            };
            let cmdline = cmdline.replace('\0', " ");
            if !pattern.is_match(&cmdline) {
                continue;
            }
            if !has_no_controlling_tty(pid) {
                continue;
            }
            if Self::kill(pid, Signal::SIGKILL).is_ok() {
                killed.push(pid);
            }
        }
        killed
    }
}

fn build_parent_index() -> HashMap<u32, Vec<u32>> {
    let mut map: HashMap<u32, Vec<u32>> = HashMap::new();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return map;
    };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        if let Some(ppid) = read_ppid(pid) {
            map.entry(ppid).or_default().push(pid);
        }
    }
    map
}

fn read_ppid(pid: u32) -> Option<u32> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Fields after the `(comm)` parenthesized group are space-separated; ppid is field 4.
    let after_comm = stat.rfind(')')?;
    let rest = &stat[after_comm + 1..];
    rest.split_whitespace().nth(1)?.parse().ok()
}

fn has_no_controlling_tty(pid: u32) -> bool {
    let stat = match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let after_comm = match stat.rfind(')') {
        Some(i) => i,
        None => return false,
    };
    let rest = &stat[after_comm + 1..];
    // tty_nr is field 7 counting from state(1); 0 means no controlling terminal.
    rest.split_whitespace()
        .nth(4)
        .and_then(|s| s.parse::<i64>().ok())
        .map(|tty| tty == 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(ProcessTree::is_alive(std::process::id()));
    }

    #[test]
    fn nonexistent_process_is_not_alive() {
        assert!(!ProcessTree::is_alive(999_999_999));
    }

    #[test]
    fn descendants_of_a_leaf_process_are_empty() {
        // A freshly allocated, almost-certainly-unused high pid has no children.
        assert!(ProcessTree::list_descendants(999_999_998).is_empty());
    }
}
