//! FileReconciler - classify install-root files against the previous manifest.
//!
//! Every file on disk falls into one of three buckets:
//! - tracked-unmodified: in the manifest, hash matches (ignored this pass)
//! - tracked-modified: in the manifest, hash differs
//! - custom: on disk but absent from the manifest (user-added)
//!
//! The scan is best-effort: an unreadable file is logged and skipped, never
//! aborting the walk.

use crate::hashing;
use crate::manifest::{
    ManifestEntry, AGENTS_CFG_DIR, CFG_DIR, MODULE_CONFIG_FILE, OVERLAY_SUFFIX, PARTIAL_MARKER,
};
use colored::Colorize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A tracked file whose on-disk content no longer matches its recorded hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedFile {
    pub path: PathBuf,
    pub relative_path: String,
}

/// Result of a reconciliation scan
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// User-added files absent from the manifest
    pub custom_files: Vec<PathBuf>,
    /// Tracked files with hash mismatches
    pub modified_files: Vec<ModifiedFile>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.custom_files.is_empty() && self.modified_files.is_empty()
    }
}

/// Scan the install root and classify every file against `previous`.
///
/// `overlay_hashes` carries the pristine whole-file hashes recorded when each
/// agent overlay was generated; an overlay only counts as custom when its
/// current hash differs from that record.
pub fn detect(
    root: &Path,
    previous: &[ManifestEntry],
    overlay_hashes: &BTreeMap<String, String>,
) -> Reconciliation {
    let by_path: HashMap<&str, &ManifestEntry> =
        previous.iter().map(|e| (e.relative_path.as_str(), e)).collect();

    let mut result = Reconciliation::default();
    if !root.exists() {
        return result;
    }

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            // The internal config subtree is excluded from the walk; its
            // overlay files are handled in a dedicated pass below.
            !(e.file_type().is_dir() && e.file_name() == CFG_DIR && e.depth() == 1)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if is_regenerated_artifact(&rel_str) {
            continue;
        }

        match by_path.get(rel_str.as_str()) {
            None => {
                if !is_compiled_agent_with_source(path, &rel_str) {
                    result.custom_files.push(path.to_path_buf());
                }
            }
            Some(manifest_entry) => {
                // Legacy rows carry no hash; modification cannot be assessed,
                // so the file is neither custom nor modified.
                let Some(recorded) = manifest_entry.hash.as_deref() else {
                    continue;
                };
                match hashing::hash_file(path) {
                    Ok(current) if current != recorded => {
                        result.modified_files.push(ModifiedFile {
                            path: path.to_path_buf(),
                            relative_path: rel_str,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        eprintln!(
                            "{}",
                            format!("⚠ Skipping unreadable file {}: {}", path.display(), e)
                                .yellow()
                        );
                    }
                }
            }
        }
    }

    scan_overlays(root, overlay_hashes, &mut result);
    result
}

/// Files regenerated on every pass are never classified
fn is_regenerated_artifact(rel: &str) -> bool {
    let components: Vec<&str> = rel.split('/').collect();
    match components.as_slice() {
        // <module>/config.yaml
        [_, MODULE_CONFIG_FILE] => true,
        // <module>/.partial-install
        [_, PARTIAL_MARKER] => true,
        _ => false,
    }
}

/// A compiled agent `.md` whose `.agent.yaml` source still exists is
/// regenerated, not custom
fn is_compiled_agent_with_source(path: &Path, rel: &str) -> bool {
    let components: Vec<&str> = rel.split('/').collect();
    let [_, "agents", filename] = components.as_slice() else {
        return false;
    };
    let Some(stem) = filename.strip_suffix(".md") else {
        return false;
    };
    path.parent()
        .map(|dir| dir.join(format!("{}.agent.yaml", stem)).exists())
        .unwrap_or(false)
}

/// Overlay files under `_cfg/agents/` use the pristine-hash rule: an
/// untouched default overlay is not a customization.
fn scan_overlays(root: &Path, overlay_hashes: &BTreeMap<String, String>, result: &mut Reconciliation) {
    let overlays_dir = root.join(CFG_DIR).join(AGENTS_CFG_DIR);
    let Ok(entries) = std::fs::read_dir(&overlays_dir) else {
        return;
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(agent_id) = name.strip_suffix(OVERLAY_SUFFIX) else {
            continue;
        };

        let current = match hashing::hash_file(&path) {
            Ok(hash) => hash,
            Err(e) => {
                eprintln!(
                    "{}",
                    format!("⚠ Skipping unreadable overlay {}: {}", path.display(), e).yellow()
                );
                continue;
            }
        };

        match overlay_hashes.get(agent_id) {
            // Differs from the recorded pristine hash: a real customization
            Some(pristine) if *pristine != current => {
                result.custom_files.push(path);
            }
            Some(_) => {}
            // No pristine hash on record; preserve it rather than guess
            None => {
                result.custom_files.push(path);
            }
        }
    }
}
