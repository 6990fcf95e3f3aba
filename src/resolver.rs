//! DependencyResolver - cross-module file dependency closure.
//!
//! A requested module's workflows/tasks/agents may reference content in
//! modules that were not requested (e.g. alpha's workflow runs a task owned
//! by beta). Those files are pulled in as a dependency-only install: just the
//! referenced files, under the owning module's directory, marked with a
//! partial-install marker instead of being treated as a full module.
//!
//! References use the content convention
//! `{project-root}/<folder>/<module>/<kind>/<path>`.

use crate::Result;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use walkdir::WalkDir;

/// Extensions scanned for dependency references
const SCAN_EXTENSIONS: &[&str] = &["md", "yaml", "yml", "txt", "xml"];

/// Files a module contributes to a resolution, grouped by kind.
/// Paths are relative to the module directory (e.g. `tasks/review.md`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleBucket {
    pub agents: BTreeSet<String>,
    pub workflows: BTreeSet<String>,
    pub tasks: BTreeSet<String>,
    pub tools: BTreeSet<String>,
    pub templates: BTreeSet<String>,
    pub data: BTreeSet<String>,
    pub other: BTreeSet<String>,
}

impl ModuleBucket {
    fn insert(&mut self, kind: &str, rel: String) -> bool {
        match kind {
            "agents" => self.agents.insert(rel),
            "workflows" => self.workflows.insert(rel),
            "tasks" => self.tasks.insert(rel),
            "tools" => self.tools.insert(rel),
            "templates" => self.templates.insert(rel),
            "data" => self.data.insert(rel),
            _ => self.other.insert(rel),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.agents.len()
            + self.workflows.len()
            + self.tasks.len()
            + self.tools.len()
            + self.templates.len()
            + self.data.len()
            + self.other.len()
    }

    /// All paths in the bucket, relative to the module directory
    pub fn paths(&self) -> Vec<String> {
        self.agents
            .iter()
            .chain(&self.workflows)
            .chain(&self.tasks)
            .chain(&self.tools)
            .chain(&self.templates)
            .chain(&self.data)
            .chain(&self.other)
            .cloned()
            .collect()
    }
}

/// Resolution result: dependency-only files per module
#[derive(Debug, Clone, Default)]
pub struct ResolvedFiles {
    pub by_module: BTreeMap<String, ModuleBucket>,
}

impl ResolvedFiles {
    /// Modules that receive a dependency-only (partial) install
    pub fn partial_modules(&self) -> Vec<&str> {
        self.by_module
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

fn reference_regex(folder: &str) -> Result<Regex> {
    let pattern = format!(
        r"\{{project-root\}}/{}/([A-Za-z0-9_-]+)/([a-z-]+)/([A-Za-z0-9._/-]+)",
        regex::escape(folder)
    );
    Ok(Regex::new(&pattern)?)
}

/// Compute the dependency closure for a requested module set.
///
/// Scans text content of every requested module, then transitively scans
/// each pulled-in dependency file for further references. References into a
/// fully requested module are ignored (the full install wins; no partial
/// marker, no duplication).
pub fn resolve(source_root: &Path, requested: &[String], folder: &str) -> Result<ResolvedFiles> {
    let re = reference_regex(folder)?;
    let requested_set: BTreeSet<&str> = requested.iter().map(|s| s.as_str()).collect();

    let mut result = ResolvedFiles::default();
    // (module, relative path) pairs still to scan for further references
    let mut queue: VecDeque<(String, String)> = VecDeque::new();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

    for module in requested {
        let module_dir = source_root.join(module);
        if !module_dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&module_dir)
            .into_iter()
            .filter_entry(|e| !is_excluded_dir(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if !is_scannable(entry.path()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&module_dir) {
                let rel = rel.to_string_lossy().replace('\\', "/");
                queue.push_back((module.clone(), rel));
            }
        }
    }

    while let Some((module, rel)) = queue.pop_front() {
        if !seen.insert((module.clone(), rel.clone())) {
            continue;
        }
        let path = source_root.join(&module).join(&rel);
        let Ok(content) = std::fs::read_to_string(&path) else {
            // Missing or binary dependency entry; the installer logs skips,
            // resolution just moves on
            continue;
        };

        for caps in re.captures_iter(&content) {
            let dep_module = caps[1].to_string();
            let kind = caps[2].to_string();
            let dep_rel = format!("{}/{}", kind, &caps[3]);

            if requested_set.contains(dep_module.as_str()) {
                continue;
            }

            let bucket = result.by_module.entry(dep_module.clone()).or_default();
            if bucket.insert(&kind, dep_rel.clone()) && is_scannable(Path::new(&dep_rel)) {
                // Newly pulled files can themselves reference further modules
                queue.push_back((dep_module, dep_rel));
            }
        }
    }

    Ok(result)
}

fn is_scannable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SCAN_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// The scan skips the same subtrees the installer never copies, so installer
/// metadata cannot pull in dependencies.
fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|n| crate::installer::EXCLUDED_DIRS.contains(&n))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
    }

    #[test]
    fn test_cross_module_reference_pulled_in() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        write(
            src,
            "alpha/workflows/build/workflow.yaml",
            "steps:\n  - run: '{project-root}/agentpack/beta/tasks/lint.md'\n",
        );
        write(src, "beta/tasks/lint.md", "# Lint");
        write(src, "beta/tasks/unrelated.md", "# Unrelated");

        let resolved = resolve(src, &["alpha".to_string()], "agentpack").unwrap();
        let beta = resolved.by_module.get("beta").unwrap();

        // Only the referenced task, nothing else beta owns
        assert_eq!(beta.tasks.len(), 1);
        assert!(beta.tasks.contains("tasks/lint.md"));
        assert_eq!(beta.len(), 1);
        assert_eq!(resolved.partial_modules(), vec!["beta"]);
    }

    #[test]
    fn test_installer_metadata_does_not_pull_dependencies() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        write(src, "alpha/tasks/go.md", "# Go");
        // Never-installed subtrees may mention other modules' content
        write(
            src,
            "alpha/_module-installer/notes.md",
            "see {project-root}/agentpack/beta/tasks/lint.md",
        );
        write(
            src,
            "alpha/sub-modules/extra/tasks/go.md",
            "see {project-root}/agentpack/beta/tasks/lint.md",
        );
        write(src, "beta/tasks/lint.md", "# Lint");

        let resolved = resolve(src, &["alpha".to_string()], "agentpack").unwrap();
        assert!(resolved.by_module.is_empty());
    }

    #[test]
    fn test_requested_module_wins_over_dependency() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        write(
            src,
            "alpha/tasks/go.md",
            "see {project-root}/agentpack/beta/tasks/lint.md",
        );
        write(src, "beta/tasks/lint.md", "# Lint");

        let requested = vec!["alpha".to_string(), "beta".to_string()];
        let resolved = resolve(src, &requested, "agentpack").unwrap();

        // beta is fully requested: no partial bucket for it
        assert!(resolved.by_module.is_empty());
    }

    #[test]
    fn test_transitive_dependency_closure() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        write(
            src,
            "alpha/tasks/go.md",
            "run {project-root}/agentpack/beta/tasks/lint.md",
        );
        write(
            src,
            "beta/tasks/lint.md",
            "uses {project-root}/agentpack/gamma/templates/report.md",
        );
        write(src, "gamma/templates/report.md", "# Report");

        let resolved = resolve(src, &["alpha".to_string()], "agentpack").unwrap();

        assert!(resolved.by_module.get("beta").unwrap().tasks.contains("tasks/lint.md"));
        assert!(resolved
            .by_module
            .get("gamma")
            .unwrap()
            .templates
            .contains("templates/report.md"));
    }

    #[test]
    fn test_folder_name_is_respected() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        write(
            src,
            "alpha/tasks/go.md",
            "run {project-root}/otherfolder/beta/tasks/lint.md",
        );

        let resolved = resolve(src, &["alpha".to_string()], "agentpack").unwrap();
        assert!(resolved.by_module.is_empty());
    }
}
