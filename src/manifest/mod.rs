//! ManifestStore - persisted install state under `<root>/_cfg/`.
//!
//! Layout (the single canonical convention):
//!
//! ```text
//! <root>/_cfg/files-manifest.csv      what was installed, with hashes
//! <root>/_cfg/manifest.yaml           modules, IDEs, custom-module registry
//! <root>/_cfg/ides/<ide>.yaml         per-IDE saved configuration
//! <root>/_cfg/agents/<id>.customize.yaml   compiled-agent overlays
//! <root>/_cfg/custom-cache/<id>/      frozen copies of custom modules
//! ```

mod files;
mod registry;

pub use files::{read_files_manifest, render_files_manifest, FileKind, ManifestEntry};
pub use registry::{CustomModuleRecord, IdeConfig, ModuleRecord, ModuleSource, PackManifest};

use crate::Result;
use anyhow::Context;
use chrono::Utc;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Reserved configuration subtree under the install root
pub const CFG_DIR: &str = "_cfg";
/// Files manifest name under CFG_DIR
pub const FILES_MANIFEST: &str = "files-manifest.csv";
/// Pack manifest name under CFG_DIR
pub const PACK_MANIFEST: &str = "manifest.yaml";
/// Per-IDE configuration directory under CFG_DIR
pub const IDES_DIR: &str = "ides";
/// Overlay directory under CFG_DIR
pub const AGENTS_CFG_DIR: &str = "agents";
/// Frozen custom-module copies under CFG_DIR
pub const CUSTOM_CACHE_DIR: &str = "custom-cache";
/// Per-module generated config file, regenerated every pass
pub const MODULE_CONFIG_FILE: &str = "config.yaml";
/// Marker file for dependency-only module installs
pub const PARTIAL_MARKER: &str = ".partial-install";
/// Overlay filename suffix
pub const OVERLAY_SUFFIX: &str = ".customize.yaml";

/// Errors raised when persisted state cannot be written
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Cannot create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-kind counts reported after manifest regeneration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub agents: usize,
    pub workflows: usize,
    pub tasks: usize,
    pub tools: usize,
    pub files: usize,
}

impl WriteStats {
    fn count(&mut self, kind: FileKind) {
        match kind {
            FileKind::Agent => self.agents += 1,
            FileKind::Workflow => self.workflows += 1,
            FileKind::Task => self.tasks += 1,
            FileKind::Tool => self.tools += 1,
            FileKind::File => self.files += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.agents + self.workflows + self.tasks + self.tools + self.files
    }
}

/// Reads and writes all persisted install state for one install root
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cfg_dir(&self) -> PathBuf {
        self.root.join(CFG_DIR)
    }

    pub fn files_manifest_path(&self) -> PathBuf {
        self.cfg_dir().join(FILES_MANIFEST)
    }

    pub fn pack_manifest_path(&self) -> PathBuf {
        self.cfg_dir().join(PACK_MANIFEST)
    }

    pub fn overlay_path(&self, agent_id: &str) -> PathBuf {
        self.cfg_dir()
            .join(AGENTS_CFG_DIR)
            .join(format!("{}{}", agent_id, OVERLAY_SUFFIX))
    }

    pub fn custom_cache_dir(&self, module_id: &str) -> PathBuf {
        self.cfg_dir().join(CUSTOM_CACHE_DIR).join(module_id)
    }

    /// An installation exists when the pack manifest is present
    pub fn is_installed(&self) -> bool {
        self.pack_manifest_path().exists()
    }

    /// Read the files manifest; missing or unreadable degrades to empty
    /// (downstream then treats everything on disk as custom rather than
    /// failing the pass)
    pub fn read_files_manifest(&self) -> Vec<ManifestEntry> {
        read_files_manifest(&self.files_manifest_path())
    }

    /// Read the pack manifest; a corrupt manifest degrades to None with a
    /// visible warning instead of blocking installation
    pub fn read_pack_manifest(&self) -> Option<PackManifest> {
        let path = self.pack_manifest_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                eprintln!(
                    "{}",
                    format!("⚠ Cannot read {}: {}", path.display(), e).yellow()
                );
                return None;
            }
        };

        match serde_yaml::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                eprintln!(
                    "{}",
                    format!(
                        "⚠ Corrupt pack manifest {} ({}); treating installation as untracked",
                        path.display(),
                        e
                    )
                    .yellow()
                );
                None
            }
        }
    }

    /// Regenerate both manifest artifacts from the authoritative list of
    /// files written this pass. The files manifest is written first so a
    /// failure between the two writes leaves the pack manifest stale rather
    /// than the file list.
    pub fn write_manifests(
        &self,
        pack: &mut PackManifest,
        installed: &[ManifestEntry],
    ) -> Result<WriteStats> {
        let cfg = self.cfg_dir();
        std::fs::create_dir_all(&cfg).map_err(|source| ManifestError::CreateDir {
            path: cfg.clone(),
            source,
        })?;

        let files_path = self.files_manifest_path();
        std::fs::write(&files_path, render_files_manifest(installed)).map_err(|source| {
            ManifestError::Write {
                path: files_path,
                source,
            }
        })?;

        pack.updated_at = Some(Utc::now());
        let yaml = serde_yaml::to_string(pack).context("Failed to serialize manifest.yaml")?;
        let pack_path = self.pack_manifest_path();
        std::fs::write(&pack_path, yaml).map_err(|source| ManifestError::Write {
            path: pack_path,
            source,
        })?;

        let mut stats = WriteStats::default();
        for entry in installed {
            stats.count(entry.kind);
        }
        Ok(stats)
    }

    /// Register (or re-register) a custom module in the pack manifest
    pub fn add_custom_module(&self, record: CustomModuleRecord) -> Result<()> {
        let mut pack = self
            .read_pack_manifest()
            .unwrap_or_else(|| PackManifest::new(env!("CARGO_PKG_VERSION")));
        pack.custom_modules.retain(|m| m.id != record.id);
        pack.custom_modules.push(record);
        self.save_pack_manifest(&mut pack)
    }

    /// Remove a custom module from the registry (manifest only; file removal
    /// is the orchestrator's job)
    pub fn remove_custom_module(&self, id: &str) -> Result<bool> {
        let Some(mut pack) = self.read_pack_manifest() else {
            return Ok(false);
        };
        let before = pack.custom_modules.len();
        pack.custom_modules.retain(|m| m.id != id);
        let removed = pack.custom_modules.len() != before;
        if removed {
            pack.modules.retain(|m| m.id != id);
            self.save_pack_manifest(&mut pack)?;
        }
        Ok(removed)
    }

    /// Remove a module from the installed-module list
    pub fn remove_module(&self, id: &str) -> Result<bool> {
        let Some(mut pack) = self.read_pack_manifest() else {
            return Ok(false);
        };
        let before = pack.modules.len();
        pack.modules.retain(|m| m.id != id);
        let removed = pack.modules.len() != before;
        if removed {
            self.save_pack_manifest(&mut pack)?;
        }
        Ok(removed)
    }

    fn save_pack_manifest(&self, pack: &mut PackManifest) -> Result<()> {
        std::fs::create_dir_all(self.cfg_dir())?;
        pack.updated_at = Some(Utc::now());
        let yaml = serde_yaml::to_string(pack).context("Failed to serialize manifest.yaml")?;
        std::fs::write(self.pack_manifest_path(), yaml)?;
        Ok(())
    }

    pub fn load_ide_config(&self, ide: &str) -> Option<IdeConfig> {
        let path = self.cfg_dir().join(IDES_DIR).join(format!("{}.yaml", ide));
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_yaml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!(
                    "{}",
                    format!("⚠ Ignoring corrupt IDE config {}: {}", path.display(), e).yellow()
                );
                None
            }
        }
    }

    pub fn save_ide_config(&self, ide: &str, config: &IdeConfig) -> Result<()> {
        let dir = self.cfg_dir().join(IDES_DIR);
        std::fs::create_dir_all(&dir)?;
        let yaml = serde_yaml::to_string(config)
            .with_context(|| format!("Failed to serialize IDE config for {}", ide))?;
        std::fs::write(dir.join(format!("{}.yaml", ide)), yaml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ManifestStore) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("agentpack");
        std::fs::create_dir_all(&root).unwrap();
        (temp, ManifestStore::new(root))
    }

    #[test]
    fn test_write_manifests_and_stats() {
        let (_temp, store) = store();
        let mut pack = PackManifest::new("0.4.2");
        pack.modules.push(ModuleRecord::bundled("core"));

        let installed = vec![
            ManifestEntry::new(FileKind::Agent, "dev", "core", "core/agents/dev.md", "sha256:aa"),
            ManifestEntry::new(FileKind::Task, "review", "core", "core/tasks/review.md", "sha256:bb"),
            ManifestEntry::new(FileKind::File, "data", "core", "core/data/list.csv", "sha256:cc"),
        ];

        let stats = store.write_manifests(&mut pack, &installed).unwrap();
        assert_eq!(stats.agents, 1);
        assert_eq!(stats.tasks, 1);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.total(), 3);

        assert!(store.is_installed());
        assert_eq!(store.read_files_manifest().len(), 3);
        let back = store.read_pack_manifest().unwrap();
        assert_eq!(back.modules[0].id, "core");
    }

    #[test]
    fn test_corrupt_pack_manifest_degrades() {
        let (_temp, store) = store();
        std::fs::create_dir_all(store.cfg_dir()).unwrap();
        std::fs::write(store.pack_manifest_path(), ": not yaml [").unwrap();

        assert!(store.read_pack_manifest().is_none());
    }

    #[test]
    fn test_custom_module_registry() {
        let (_temp, store) = store();
        store
            .add_custom_module(CustomModuleRecord {
                id: "mine".to_string(),
                name: "Mine".to_string(),
                source_path: PathBuf::from("/abs/mine"),
                cached_copy_path: None,
                orphaned: false,
            })
            .unwrap();

        let pack = store.read_pack_manifest().unwrap();
        assert_eq!(pack.custom_modules.len(), 1);

        assert!(store.remove_custom_module("mine").unwrap());
        assert!(!store.remove_custom_module("mine").unwrap());
        let pack = store.read_pack_manifest().unwrap();
        assert!(pack.custom_modules.is_empty());
    }

    #[test]
    fn test_ide_config_round_trip() {
        let (_temp, store) = store();
        let mut config = IdeConfig::new();
        config.insert("commands_dir".to_string(), ".claude/commands".to_string());

        store.save_ide_config("claude-code", &config).unwrap();
        let back = store.load_ide_config("claude-code").unwrap();
        assert_eq!(back.get("commands_dir").unwrap(), ".claude/commands");

        assert!(store.load_ide_config("unknown").is_none());
    }
}
