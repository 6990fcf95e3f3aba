//! FilesManifest - the tabular record of every file the installer wrote.
//!
//! Stored as `_cfg/files-manifest.csv` with columns
//! `type,name,module,path,hash`. Reading is deliberately tolerant: a missing
//! manifest yields an empty list, rows from older formats without a hash
//! column yield `hash: None`, and malformed rows are skipped with a warning.
//! A corrupt manifest must never block installation.

use colored::Colorize;
use std::fmt;
use std::path::Path;

/// Kind of an installed file, as recorded in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileKind {
    Agent,
    Workflow,
    Task,
    Tool,
    File,
}

impl FileKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(Self::Agent),
            "workflow" => Some(Self::Workflow),
            "task" => Some(Self::Task),
            "tool" => Some(Self::Tool),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Agent => "agent",
            Self::Workflow => "workflow",
            Self::Task => "task",
            Self::Tool => "tool",
            Self::File => "file",
        };
        write!(f, "{}", s)
    }
}

/// One record per installed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: FileKind,
    pub name: String,
    pub module: String,
    /// Path relative to the install root, forward slashes
    pub relative_path: String,
    /// Content hash recorded at write time; None for legacy rows
    pub hash: Option<String>,
}

impl ManifestEntry {
    pub fn new(
        kind: FileKind,
        name: impl Into<String>,
        module: impl Into<String>,
        relative_path: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            module: module.into(),
            relative_path: relative_path.into(),
            hash: Some(hash.into()),
        }
    }
}

const HEADER: &str = "type,name,module,path,hash";

/// Read a files manifest, tolerating missing files and malformed rows
pub fn read_files_manifest(path: &Path) -> Vec<ManifestEntry> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            eprintln!(
                "{}",
                format!("⚠ Cannot read files manifest {}: {}", path.display(), e).yellow()
            );
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line == HEADER {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        // 4 fields is the older format without a hash column
        let entry = match fields.as_slice() {
            [kind, name, module, rel_path, hash] => FileKind::parse(kind).map(|kind| ManifestEntry {
                kind,
                name: (*name).to_string(),
                module: (*module).to_string(),
                relative_path: (*rel_path).to_string(),
                hash: Some((*hash).to_string()).filter(|h| !h.is_empty()),
            }),
            [kind, name, module, rel_path] => FileKind::parse(kind).map(|kind| ManifestEntry {
                kind,
                name: (*name).to_string(),
                module: (*module).to_string(),
                relative_path: (*rel_path).to_string(),
                hash: None,
            }),
            _ => None,
        };

        match entry {
            Some(entry) => entries.push(entry),
            None => {
                eprintln!(
                    "{}",
                    format!(
                        "⚠ Skipping malformed manifest row {} in {}",
                        lineno + 1,
                        path.display()
                    )
                    .yellow()
                );
            }
        }
    }

    entries
}

/// Serialize entries to the manifest CSV format, sorted by relative path
/// so repeated identical installs produce byte-identical manifests
pub fn render_files_manifest(entries: &[ManifestEntry]) -> String {
    let mut sorted: Vec<&ManifestEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    let mut out = String::from(HEADER);
    out.push('\n');
    for entry in sorted {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            entry.kind,
            entry.name,
            entry.module,
            entry.relative_path,
            entry.hash.as_deref().unwrap_or("")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_manifest_is_empty() {
        let temp = TempDir::new().unwrap();
        let entries = read_files_manifest(&temp.path().join("files-manifest.csv"));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("files-manifest.csv");

        let entries = vec![
            ManifestEntry::new(FileKind::Agent, "dev", "core", "core/agents/dev.md", "sha256:aa"),
            ManifestEntry::new(FileKind::Task, "review", "alpha", "alpha/tasks/review.md", "sha256:bb"),
        ];
        std::fs::write(&path, render_files_manifest(&entries)).unwrap();

        let read = read_files_manifest(&path);
        assert_eq!(read.len(), 2);
        // Sorted by relative path on write
        assert_eq!(read[0].module, "alpha");
        assert_eq!(read[1].name, "dev");
        assert_eq!(read[1].hash.as_deref(), Some("sha256:aa"));
    }

    #[test]
    fn test_legacy_rows_without_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("files-manifest.csv");
        std::fs::write(&path, "agent,dev,core,core/agents/dev.md\n").unwrap();

        let read = read_files_manifest(&path);
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].hash, None);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("files-manifest.csv");
        std::fs::write(
            &path,
            "type,name,module,path,hash\n\
             garbage line\n\
             notakind,x,core,core/x.md,sha256:aa\n\
             task,review,alpha,alpha/tasks/review.md,sha256:bb\n",
        )
        .unwrap();

        let read = read_files_manifest(&path);
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].name, "review");
    }

    #[test]
    fn test_empty_hash_column_reads_as_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("files-manifest.csv");
        std::fs::write(&path, "task,review,alpha,alpha/tasks/review.md,\n").unwrap();

        let read = read_files_manifest(&path);
        assert_eq!(read[0].hash, None);
    }
}
