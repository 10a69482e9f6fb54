//! Rate-limited Builder (`spec.md` §8 scenario 6): before claiming an issue,
//! the shepherd consults `UsageFacade::check_advisory` and backs off with
//! `ShepherdOutcome::RateLimited` once the session usage percentage reaches
//! `DaemonConfig::rate_limit_threshold` (`shepherd/orchestrator.rs`'s claim
//! gate). The full pipeline needs a `tmux` session to drive the Curator/
//! Builder phases, so this exercises the gate condition directly against a
//! real stub usage binary, the same literal-script-path technique the
//! facade's own inline tests use — no `PATH` manipulation required since
//! `UsageFacade::command` is just a configurable string.

use std::os::unix::fs::PermissionsExt;

use loom::config::DaemonConfig;
use loom::platform::usage::UsageFacade;

fn stub_usage_binary(dir: &std::path::Path, percent: &str) -> std::path::PathBuf {
    let path = dir.join("loom-usage-stub");
    std::fs::write(&path, format!("#!/bin/sh\necho {percent}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn usage_at_or_above_threshold_triggers_the_rate_limit_gate() {
    let dir = tempfile::TempDir::new().unwrap();
    let bin = stub_usage_binary(dir.path(), "92.0");
    let usage = UsageFacade::new(bin.to_str().unwrap());
    let cfg = DaemonConfig::default();

    let reading = usage.check_advisory().expect("stub binary reports a reading");
    assert!(reading.session_percent >= cfg.rate_limit_threshold);
}

#[test]
fn usage_below_threshold_does_not_trigger_the_gate() {
    let dir = tempfile::TempDir::new().unwrap();
    let bin = stub_usage_binary(dir.path(), "10.0");
    let usage = UsageFacade::new(bin.to_str().unwrap());
    let cfg = DaemonConfig::default();

    let reading = usage.check_advisory().expect("stub binary reports a reading");
    assert!(reading.session_percent < cfg.rate_limit_threshold);
}

#[test]
fn a_failing_usage_check_is_advisory_and_never_blocks_the_claim() {
    let usage = UsageFacade::new("loom-usage-binary-that-does-not-exist");
    // `check_advisory` swallows the error; the orchestrator's `if let Some(..)`
    // gate is simply skipped, so an unreachable usage helper never rate-limits.
    assert!(usage.check_advisory().is_none());
}
