//! Filesystem primitives: atomic write, read-or-default, mtime, glob listing.
//!
//! Atomic write is write-to-temp-plus-rename, the same pattern the store and
//! progress files build on (spec §6.1: "writers use temp-file-plus-rename").

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{LoomError, Transience};

pub struct FsOps;

impl FsOps {
    /// Atomically write `content` to `path`: write to a sibling temp file, then
    /// rename over the destination. Rename is atomic on the same filesystem, so
    /// readers never observe a partially-written file.
    pub fn atomic_write(path: &Path, content: &str) -> Result<(), LoomError> {
        let parent = path.parent().ok_or_else(|| {
            LoomError::Validation(format!("path has no parent: {}", path.display()))
        })?;
        std::fs::create_dir_all(parent).map_err(|e| {
            LoomError::external(format!("create_dir_all {}: {e}", parent.display()), Transience::Transient)
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            LoomError::external(format!("create temp file in {}: {e}", parent.display()), Transience::Transient)
        })?;
        use std::io::Write;
        tmp.write_all(content.as_bytes()).map_err(|e| {
            LoomError::external(format!("write temp file: {e}"), Transience::Transient)
        })?;
        tmp.as_file().sync_all().ok();
        tmp.persist(path).map_err(|e| {
            LoomError::external(format!("rename temp file to {}: {e}", path.display()), Transience::Transient)
        })?;
        Ok(())
    }

    /// Read `path`, or return `default` if it does not exist.
    pub fn read_or_default(path: &Path, default: &str) -> Result<String, LoomError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(default.to_string()),
            Err(e) => Err(LoomError::external(
                format!("read {}: {e}", path.display()),
                Transience::Transient,
            )),
        }
    }

    pub fn stat_mtime(path: &Path) -> Result<SystemTime, LoomError> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LoomError::NotFound(path.display().to_string())
                } else {
                    LoomError::external(format!("stat {}: {e}", path.display()), Transience::Transient)
                }
            })
    }

    pub fn list_glob(pattern: &str) -> Result<Vec<PathBuf>, LoomError> {
        let entries = glob::glob(pattern)
            .map_err(|e| LoomError::Validation(format!("invalid glob {pattern}: {e}")))?;
        let mut out = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => out.push(path),
                Err(e) => {
                    return Err(LoomError::external(
                        format!("glob entry error: {e}"),
                        Transience::Transient,
                    ))
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/state.json");
        FsOps::atomic_write(&path, "{\"a\":1}").unwrap();
        let content = FsOps::read_or_default(&path, "{}").unwrap();
        assert_eq!(content, "{\"a\":1}");
    }

    #[test]
    fn read_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let content = FsOps::read_or_default(&path, "{}").unwrap();
        assert_eq!(content, "{}");
    }

    #[test]
    fn list_glob_matches_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        let pattern = format!("{}/*.json", dir.path().display());
        let matches = FsOps::list_glob(&pattern).unwrap();
        assert_eq!(matches.len(), 1);
    }
}
