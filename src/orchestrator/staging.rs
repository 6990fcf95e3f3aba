//! Temporary holding area for files that must survive a reinstall.
//!
//! Custom and user-modified files are stashed here before the install root
//! is rewritten, then restored afterwards. The backing store is injected so
//! the orchestrator's backup/restore logic can be tested without touching
//! a real temp directory.

use crate::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub trait Staging {
    /// Copy `source` into the staging area under `relative_path`.
    fn stash(&mut self, relative_path: &str, source: &Path) -> Result<()>;

    /// Copy a stashed file out to `dest`, creating parent directories.
    fn restore(&self, relative_path: &str, dest: &Path) -> Result<()>;

    fn contains(&self, relative_path: &str) -> bool;

    fn stashed_paths(&self) -> Vec<String>;

    /// Disarm cleanup so stashed files outlive a failed run. Returns the
    /// on-disk location to report, if there is one.
    fn keep(&mut self) -> Option<PathBuf>;
}

/// Stages into a temp directory that is deleted on drop unless kept
pub struct FsStaging {
    dir: Option<tempfile::TempDir>,
    paths: Vec<String>,
}

impl FsStaging {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("agentpack-backup-")
            .tempdir()
            .context("Failed to create backup directory")?;
        Ok(Self {
            dir: Some(dir),
            paths: Vec::new(),
        })
    }

    fn base(&self) -> Result<&Path> {
        match &self.dir {
            Some(dir) => Ok(dir.path()),
            None => anyhow::bail!("Backup directory already released"),
        }
    }
}

impl Staging for FsStaging {
    fn stash(&mut self, relative_path: &str, source: &Path) -> Result<()> {
        let dest = self.base()?.join(relative_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, &dest)
            .with_context(|| format!("Failed to back up {}", source.display()))?;
        if !self.paths.iter().any(|p| p == relative_path) {
            self.paths.push(relative_path.to_string());
        }
        Ok(())
    }

    fn restore(&self, relative_path: &str, dest: &Path) -> Result<()> {
        let source = self.base()?.join(relative_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, dest)
            .with_context(|| format!("Failed to restore {}", relative_path))?;
        Ok(())
    }

    fn contains(&self, relative_path: &str) -> bool {
        self.paths.iter().any(|p| p == relative_path)
    }

    fn stashed_paths(&self) -> Vec<String> {
        self.paths.clone()
    }

    fn keep(&mut self) -> Option<PathBuf> {
        self.dir.take().map(|dir| dir.keep())
    }
}

/// In-memory staging for tests
#[derive(Default)]
pub struct MemStaging {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemStaging {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Staging for MemStaging {
    fn stash(&mut self, relative_path: &str, source: &Path) -> Result<()> {
        let bytes = std::fs::read(source)
            .with_context(|| format!("Failed to back up {}", source.display()))?;
        self.files.insert(relative_path.to_string(), bytes);
        Ok(())
    }

    fn restore(&self, relative_path: &str, dest: &Path) -> Result<()> {
        let bytes = self
            .files
            .get(relative_path)
            .with_context(|| format!("Nothing staged at {}", relative_path))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, bytes)?;
        Ok(())
    }

    fn contains(&self, relative_path: &str) -> bool {
        self.files.contains_key(relative_path)
    }

    fn stashed_paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn keep(&mut self) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_staging_round_trip() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("notes/todo.md");
        std::fs::create_dir_all(original.parent().unwrap()).unwrap();
        std::fs::write(&original, "my notes").unwrap();

        let mut staging = FsStaging::new().unwrap();
        staging.stash("notes/todo.md", &original).unwrap();
        assert!(staging.contains("notes/todo.md"));

        std::fs::remove_file(&original).unwrap();
        staging.restore("notes/todo.md", &original).unwrap();
        assert_eq!(std::fs::read_to_string(&original).unwrap(), "my notes");
    }

    #[test]
    fn test_keep_disarms_cleanup() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("a.md");
        std::fs::write(&original, "x").unwrap();

        let mut staging = FsStaging::new().unwrap();
        staging.stash("a.md", &original).unwrap();

        let kept = staging.keep().unwrap();
        assert!(kept.join("a.md").exists());
        std::fs::remove_dir_all(kept).unwrap();
    }

    #[test]
    fn test_mem_staging_round_trip() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("a.md");
        std::fs::write(&original, "hello").unwrap();

        let mut staging = MemStaging::new();
        staging.stash("a.md", &original).unwrap();

        let out = temp.path().join("restored/a.md");
        staging.restore("a.md", &out).unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "hello");
        assert!(staging.keep().is_none());
    }
}
