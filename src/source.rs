//! Where module source trees come from.
//!
//! Bundled modules live in the distribution pack next to the binary (or
//! wherever `AGENTPACK_SOURCE` points). Custom modules are registered with a
//! live source path plus a frozen copy under the install's custom cache, so
//! an update can still proceed when the live path has gone away.

use crate::manifest::{CustomModuleRecord, ManifestStore};
use crate::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SOURCE_ENV: &str = "AGENTPACK_SOURCE";

/// Maps a module id to the directory holding its source tree
pub trait SourceLookup {
    fn module_dir(&self, module_id: &str) -> Option<PathBuf>;
    fn module_ids(&self) -> Vec<String>;
}

/// The modules shipped with the distribution
pub struct BundledSource {
    root: PathBuf,
}

impl BundledSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the bundled pack: `AGENTPACK_SOURCE` wins, then a `modules`
    /// directory next to the executable.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var(SOURCE_ENV) {
            let root = PathBuf::from(path);
            if root.is_dir() {
                return Ok(Self::new(root));
            }
            anyhow::bail!("{} points at a missing directory: {}", SOURCE_ENV, root.display());
        }

        let exe = std::env::current_exe().context("Failed to locate executable")?;
        if let Some(dir) = exe.parent() {
            let candidate = dir.join("modules");
            if candidate.is_dir() {
                return Ok(Self::new(candidate));
            }
        }

        anyhow::bail!(
            "No bundled module pack found; set {} to the pack's modules directory",
            SOURCE_ENV
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceLookup for BundledSource {
    fn module_dir(&self, module_id: &str) -> Option<PathBuf> {
        let dir = self.root.join(module_id);
        dir.is_dir().then_some(dir)
    }

    fn module_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return ids;
        };
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with('.') && !name.starts_with('_') {
                        ids.push(name.to_string());
                    }
                }
            }
        }
        ids.sort();
        ids
    }
}

/// Where a custom module's source will be read from on this pass
#[derive(Debug, Clone, PartialEq)]
pub enum CustomSourceState {
    /// Live source path is reachable
    Live(PathBuf),
    /// Live path gone, frozen cache copy available
    CachedOnly(PathBuf),
    /// Neither live source nor cache copy exists
    Missing,
}

pub fn resolve_custom_source(record: &CustomModuleRecord) -> CustomSourceState {
    if record.source_path.is_dir() {
        return CustomSourceState::Live(record.source_path.clone());
    }
    if let Some(cached) = &record.cached_copy_path {
        if cached.is_dir() {
            return CustomSourceState::CachedOnly(cached.clone());
        }
    }
    CustomSourceState::Missing
}

/// Mirror a custom module's live source into the install's frozen cache,
/// replacing any previous copy.
pub fn refresh_custom_cache(
    store: &ManifestStore,
    module_id: &str,
    live_source: &Path,
) -> Result<PathBuf> {
    let cache_dir = store.custom_cache_dir(module_id);
    if cache_dir.exists() {
        std::fs::remove_dir_all(&cache_dir)
            .with_context(|| format!("Failed to clear cache for '{}'", module_id))?;
    }
    copy_tree(live_source, &cache_dir)
        .with_context(|| format!("Failed to cache custom module '{}'", module_id))?;
    Ok(cache_dir)
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in walkdir::WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .context("Walked outside source tree")?;
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Bundled modules plus registered custom modules, custom taking
/// precedence so a custom module can shadow a bundled id.
pub struct PackSource {
    bundled: BundledSource,
    custom: BTreeMap<String, PathBuf>,
}

impl PackSource {
    pub fn new(bundled: BundledSource) -> Self {
        Self {
            bundled,
            custom: BTreeMap::new(),
        }
    }

    pub fn add_custom(&mut self, module_id: &str, source_dir: PathBuf) {
        self.custom.insert(module_id.to_string(), source_dir);
    }

    pub fn bundled(&self) -> &BundledSource {
        &self.bundled
    }

    pub fn is_custom(&self, module_id: &str) -> bool {
        self.custom.contains_key(module_id)
    }
}

impl SourceLookup for PackSource {
    fn module_dir(&self, module_id: &str) -> Option<PathBuf> {
        if let Some(dir) = self.custom.get(module_id) {
            return Some(dir.clone());
        }
        self.bundled.module_dir(module_id)
    }

    fn module_ids(&self) -> Vec<String> {
        let mut ids = self.bundled.module_ids();
        for id in self.custom.keys() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }
}
