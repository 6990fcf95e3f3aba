//! PackManifest - the YAML record of modules, IDEs and custom-module registry.
//!
//! Lives at `_cfg/manifest.yaml`. Where the files manifest answers "which
//! files, with what hash", this one answers "which modules, from where, for
//! which IDEs" and carries the overlay pristine-hash map used by the
//! reconciler's customization tie-break.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-IDE key/value settings collected interactively once and persisted
pub type IdeConfig = BTreeMap<String, String>;

/// Where a module's authoritative source lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleSource {
    /// Shipped with the installer
    Bundled,
    /// Registered by the user, source outside the bundled tree
    Custom,
}

/// One installed module as listed in manifest.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub source: ModuleSource,
    /// Installed dependency-only (pulled in by another module's references)
    #[serde(default)]
    pub partial: bool,
}

impl ModuleRecord {
    pub fn bundled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: None,
            source: ModuleSource::Bundled,
            partial: false,
        }
    }
}

/// Registry entry for a module whose source lives outside the bundled tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomModuleRecord {
    pub id: String,
    pub name: String,
    /// Absolute source path, resolved at record time
    pub source_path: PathBuf,
    /// Frozen copy under the install root, kept so updates survive a
    /// vanished source
    #[serde(default)]
    pub cached_copy_path: Option<PathBuf>,
    /// Both live source and cache unreachable; user elected to keep it
    #[serde(default)]
    pub orphaned: bool,
}

/// manifest.yaml top-level document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackManifest {
    /// Installer version that wrote this manifest
    pub version: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
    #[serde(default)]
    pub ides: Vec<String>,
    #[serde(default)]
    pub custom_modules: Vec<CustomModuleRecord>,
    /// Overlay file pristine hashes, keyed by agent id, recorded when each
    /// overlay was first generated
    #[serde(default)]
    pub overlay_hashes: BTreeMap<String, String>,
}

impl PackManifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            updated_at: Some(Utc::now()),
            modules: Vec::new(),
            ides: Vec::new(),
            custom_modules: Vec::new(),
            overlay_hashes: BTreeMap::new(),
        }
    }

    pub fn module(&self, id: &str) -> Option<&ModuleRecord> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn custom_module(&self, id: &str) -> Option<&CustomModuleRecord> {
        self.custom_modules.iter().find(|m| m.id == id)
    }

    pub fn module_ids(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.id.clone()).collect()
    }
}
