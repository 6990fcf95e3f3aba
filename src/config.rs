//! Immutable configuration and outcome values for an install/update pass.
//!
//! One `InstallConfig` is built up front (CLI flags + collected answers) and
//! threaded as a value through the orchestrator's call chain. Nothing in the
//! core reads ambient mutable state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default name of the install root folder under the target project
pub const DEFAULT_FOLDER_NAME: &str = "agentpack";

/// The reserved, always-installed module
pub const CORE_MODULE: &str = "core";

/// Configuration for one install/update pass
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Target project directory (the install root lives beneath it)
    pub target_dir: PathBuf,
    /// Name of the install root folder (token-substituted into content)
    pub folder_name: String,
    /// Requested module ids ("core" is implied and always installed)
    pub modules: Vec<String>,
    /// Selected IDE ids
    pub ides: Vec<String>,
    /// Per-module collected answers, written into each module's config.yaml
    pub answers: BTreeMap<String, BTreeMap<String, String>>,
    /// Optional-feature flags (e.g. voice-style injection on/off)
    pub features: BTreeMap<String, bool>,
    /// Regenerate manifests and compiled artifacts only, skip content copy
    pub quick_update: bool,
    /// Delete the existing install root before installing
    pub force_reinstall: bool,
}

impl InstallConfig {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            modules: Vec::new(),
            ides: Vec::new(),
            answers: BTreeMap::new(),
            features: BTreeMap::new(),
            quick_update: false,
            force_reinstall: false,
        }
    }

    /// Absolute path of the install root for this pass
    pub fn install_root(&self) -> PathBuf {
        self.target_dir.join(&self.folder_name)
    }

    /// Requested modules with "core" forced to the front, deduplicated
    pub fn effective_modules(&self) -> Vec<String> {
        let mut result = vec![CORE_MODULE.to_string()];
        for id in &self.modules {
            if id != CORE_MODULE && !result.contains(id) {
                result.push(id.clone());
            }
        }
        result
    }
}

/// Result of an install/update pass, reported back to the caller
#[derive(Debug, Clone, Default)]
pub struct InstallOutcome {
    pub success: bool,
    /// Install root that was written
    pub path: PathBuf,
    /// Modules installed this pass (full installs, not dependency-only)
    pub modules: Vec<String>,
    /// IDEs configured this pass
    pub ides: Vec<String>,
    /// Files the user had modified; fresh content won, a `.bak` sibling holds theirs
    pub modified_files: Vec<PathBuf>,
    /// User-added files preserved untouched
    pub custom_files: Vec<PathBuf>,
    /// Human-readable warnings accumulated during the pass
    pub warnings: Vec<String>,
}

/// Installed-state snapshot for `agentpack status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledState {
    pub installed: bool,
    pub path: PathBuf,
    /// Installer version recorded in the manifest, if any
    pub version: Option<String>,
    pub modules: Vec<String>,
    pub ides: Vec<String>,
    pub custom_modules: Vec<String>,
    /// Number of files tracked by the files manifest
    pub file_count: usize,
}

impl InstalledState {
    pub fn not_installed(path: &Path) -> Self {
        Self {
            installed: false,
            path: path.to_path_buf(),
            version: None,
            modules: Vec::new(),
            ides: Vec::new(),
            custom_modules: Vec::new(),
            file_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_modules_forces_core_first() {
        let mut config = InstallConfig::new("/tmp/project");
        config.modules = vec!["alpha".to_string(), "core".to_string(), "alpha".to_string()];

        assert_eq!(config.effective_modules(), vec!["core", "alpha"]);
    }

    #[test]
    fn test_install_root_uses_folder_name() {
        let mut config = InstallConfig::new("/tmp/project");
        config.folder_name = "pack".to_string();

        assert_eq!(config.install_root(), PathBuf::from("/tmp/project/pack"));
    }
}
