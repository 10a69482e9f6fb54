//! Timestamped-archive rotation shared by state and metrics documents
//! (spec §6.1: `daemon-state.json` / `daemon-metrics.json`, each rotated to
//! `<stem>-<YYYYmmdd-HHMMSS>.json`, keeping the most recent N archives).

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{LoomError, Transience};
use crate::platform::FsOps;

pub fn rotate_to_archive(path: &Path, stem: &str, now: DateTime<Utc>, keep: usize) -> Result<(), LoomError> {
    let Some(dir) = path.parent() else {
        return Err(LoomError::Validation(format!("path has no parent: {}", path.display())));
    };
    let timestamp = now.format("%Y%m%d-%H%M%S");
    let archive_path = dir.join(format!("{stem}-{timestamp}.json"));
    std::fs::rename(path, &archive_path).map_err(|e| {
        LoomError::external(format!("rotate {} to {}: {e}", path.display(), archive_path.display()), Transience::Transient)
    })?;
    prune_archives(dir, stem, keep)
}

fn prune_archives(dir: &Path, stem: &str, keep: usize) -> Result<(), LoomError> {
    let pattern = format!("{}/{stem}-*.json", dir.display());
    let mut archives = FsOps::list_glob(&pattern)?;
    // Timestamp format sorts lexicographically, so a plain sort orders oldest first.
    archives.sort();
    if archives.len() > keep {
        let excess = archives.len() - keep;
        for stale in &archives[..excess] {
            std::fs::remove_file(stale).map_err(|e| {
                LoomError::external(format!("prune archive {}: {e}", stale.display()), Transience::Transient)
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_keeps_only_the_newest_n_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon-state.json");
        let base = Utc::now();
        for i in 0..15 {
            std::fs::write(&path, format!("{{\"n\":{i}}}")).unwrap();
            let ts = base + chrono::Duration::seconds(i);
            rotate_to_archive(&path, "daemon-state", ts, 10).unwrap();
        }
        let archives = FsOps::list_glob(&format!("{}/daemon-state-*.json", dir.path().display())).unwrap();
        assert_eq!(archives.len(), 10);
    }
}
