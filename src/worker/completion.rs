//! Role-specific completion-pattern matching over the last lines of pane
//! output (spec §4.4, mechanism 3: log pattern).

use regex::Regex;

/// Patterns that, if seen in the pane tail, suggest the worker finished its
/// phase. Matching is advisory only — callers must still run a check-only
/// contract validation before declaring completion, to avoid matching a
/// UI-rendered-but-not-yet-executed command.
pub fn patterns_for_role(role: &str) -> Vec<Regex> {
    match role {
        "builder" => vec![Regex::new(r"https://github\.com/[^\s]+/pull/\d+").unwrap()],
        "judge" => vec![Regex::new(r"loom:pr|loom:changes-requested").unwrap()],
        "doctor" => vec![Regex::new(r"loom:review-requested").unwrap()],
        "curator" => vec![Regex::new(r"loom:curated").unwrap()],
        _ => vec![Regex::new(r"(^|\s)/exit(\s|$)").unwrap()],
    }
}

pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

pub fn matches_completion(pane_text: &str, patterns: &[Regex]) -> bool {
    let tail = tail_lines(pane_text, 100);
    patterns.iter().any(|p| p.is_match(&tail))
}

/// Plan-mode approval prompt detector ("Would you like to proceed"); on match
/// the caller sends `1` then Enter, once per wait.
pub fn looks_like_approval_prompt(pane_text: &str) -> bool {
    pane_text.contains("Would you like to proceed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_pattern_matches_pr_url() {
        let patterns = patterns_for_role("builder");
        let pane = "opening pull request...\nhttps://github.com/acme/repo/pull/42\ndone";
        assert!(matches_completion(pane, &patterns));
    }

    #[test]
    fn judge_pattern_matches_label_names() {
        let patterns = patterns_for_role("judge");
        assert!(matches_completion("applied label loom:changes-requested", &patterns));
        assert!(!matches_completion("still reviewing", &patterns));
    }

    #[test]
    fn tail_lines_caps_at_requested_count() {
        let text = (0..200).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text, 100);
        assert_eq!(tail.lines().count(), 100);
        assert!(tail.starts_with("line100"));
    }

    #[test]
    fn approval_prompt_is_detected() {
        assert!(looks_like_approval_prompt("1. Yes\n2. No\nWould you like to proceed?"));
        assert!(!looks_like_approval_prompt("nothing interesting here"));
    }
}
