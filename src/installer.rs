//! ModuleInstaller - copy a module's source tree into the install root.
//!
//! Text-like files get placeholder substitution and feature-marker
//! processing on the way through; everything else is copied byte-for-byte
//! (binary files are never opened as text). Every file actually written is
//! reported through the `on_file_written` callback — that callback is the
//! sole mechanism by which the manifest's authoritative file list is built.

use crate::compiler;
use crate::manifest::{FileKind, PARTIAL_MARKER};
use crate::markers::{self, FeatureSet};
use crate::Result;
use anyhow::Context;
use colored::Colorize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Subtrees and files in a module source that are never installed
pub(crate) const EXCLUDED_DIRS: &[&str] = &["_module-installer", "sub-modules"];
const EXCLUDED_FILES: &[&str] = &["config-schema.yaml"];

/// Extensions treated as text (substitution + markers); everything else is
/// copied raw
const TEXT_EXTENSIONS: &[&str] = &["md", "yaml", "yml", "txt", "csv", "json", "xml"];

/// Token replaced with the install root folder name in text content
const FOLDER_TOKEN: &str = "{agentpack-folder}";

/// One file written during installation, as reported to the callback
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// Relative to the install root, forward slashes
    pub relative_path: String,
    pub kind: FileKind,
    pub name: String,
    pub module: String,
}

/// Per-module install options for one pass
pub struct InstallOptions<'a> {
    /// Install root folder name, substituted for the folder token
    pub folder_name: &'a str,
    /// Collected answers for this module; `include_<dir>: "false"` excludes
    /// that top-level source directory
    pub answers: Option<&'a BTreeMap<String, String>>,
    pub features: &'a FeatureSet,
    /// Defer the module's post-install hook (run after IDE setup)
    pub skip_post_install: bool,
}

/// Feature injections performed while installing a module
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// (relative path, marker name) pairs recorded as feature-injected
    pub injected: Vec<(String, String)>,
    /// Post-install hook messages (empty when the hook was deferred)
    pub messages: Vec<String>,
}

/// Declarative post-install hook shipped at `_module-installer/post-install.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInstallHook {
    #[serde(default)]
    pub messages: Vec<String>,
    /// Files under `_module-installer/`, copied into the installed module dir
    #[serde(default)]
    pub docs: Vec<String>,
}

/// Install a full module source tree under `<target_root>/<module_id>/`.
pub fn install(
    module_id: &str,
    source_dir: &Path,
    target_root: &Path,
    opts: &InstallOptions<'_>,
    on_file_written: &mut dyn FnMut(WrittenFile),
) -> Result<InstallReport> {
    let mut report = InstallReport::default();

    for entry in WalkDir::new(source_dir)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.depth() == 1
                && EXCLUDED_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .context("walked file outside source dir")?;
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if entry.depth() == 1 && EXCLUDED_FILES.contains(&rel_str.as_str()) {
            continue;
        }
        if let Some(top) = rel_str.split('/').next() {
            if is_excluded_by_answers(top, opts.answers) {
                continue;
            }
        }
        if is_localskip_agent(entry.path(), &rel_str) {
            continue;
        }

        if let Err(e) = copy_one(module_id, entry.path(), &rel_str, target_root, opts, &mut report, on_file_written) {
            eprintln!(
                "{}",
                format!("⚠ Skipping {}: {}", entry.path().display(), e).yellow()
            );
        }
    }

    if !opts.skip_post_install {
        report.messages = run_post_install(module_id, source_dir, target_root, on_file_written)?;
    }

    Ok(report)
}

/// Install only the listed files of a module (dependency-only install).
///
/// Files are placed under the module's directory without the full module
/// structure, and a partial-install marker is written. A missing source file
/// is logged and skipped; the rest of the list still installs.
pub fn install_partial(
    module_id: &str,
    source_dir: &Path,
    target_root: &Path,
    files: &[String],
    opts: &InstallOptions<'_>,
    on_file_written: &mut dyn FnMut(WrittenFile),
) -> Result<InstallReport> {
    let mut report = InstallReport::default();

    for rel in files {
        let source = source_dir.join(rel);
        if !source.exists() {
            eprintln!(
                "{}",
                format!(
                    "⚠ Dependency file missing from {}: {} (skipped)",
                    module_id, rel
                )
                .yellow()
            );
            continue;
        }
        if let Err(e) = copy_one(module_id, &source, rel, target_root, opts, &mut report, on_file_written) {
            eprintln!("{}", format!("⚠ Skipping {}: {}", source.display(), e).yellow());
        }
    }

    let marker = target_root.join(module_id).join(PARTIAL_MARKER);
    if let Some(parent) = marker.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&marker, "")?;

    Ok(report)
}

/// Read a module's post-install hook, if it ships one
pub fn read_post_install_hook(source_dir: &Path) -> Option<PostInstallHook> {
    let path = source_dir.join("_module-installer").join("post-install.yaml");
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_yaml::from_str(&content) {
        Ok(hook) => Some(hook),
        Err(e) => {
            eprintln!(
                "{}",
                format!("⚠ Ignoring malformed hook {}: {}", path.display(), e).yellow()
            );
            None
        }
    }
}

/// Run a module's deferred post-install hook: copy declared docs into the
/// installed module and return the messages to display.
pub fn run_post_install(
    module_id: &str,
    source_dir: &Path,
    target_root: &Path,
    on_file_written: &mut dyn FnMut(WrittenFile),
) -> Result<Vec<String>> {
    let Some(hook) = read_post_install_hook(source_dir) else {
        return Ok(Vec::new());
    };

    for doc in &hook.docs {
        let source = source_dir.join("_module-installer").join(doc);
        let Some(file_name) = source.file_name() else {
            continue;
        };
        if !source.exists() {
            eprintln!(
                "{}",
                format!("⚠ Hook doc missing from {}: {} (skipped)", module_id, doc).yellow()
            );
            continue;
        }

        let target = target_root.join(module_id).join(file_name);
        std::fs::create_dir_all(target.parent().unwrap_or(target_root))?;
        std::fs::copy(&source, &target)
            .with_context(|| format!("Failed to copy hook doc {}", source.display()))?;

        let rel = format!("{}/{}", module_id, file_name.to_string_lossy());
        on_file_written(WrittenFile {
            path: target,
            relative_path: rel,
            kind: FileKind::File,
            name: file_name.to_string_lossy().to_string(),
            module: module_id.to_string(),
        });
    }

    Ok(hook.messages)
}

fn copy_one(
    module_id: &str,
    source: &Path,
    rel: &str,
    target_root: &Path,
    opts: &InstallOptions<'_>,
    report: &mut InstallReport,
    on_file_written: &mut dyn FnMut(WrittenFile),
) -> Result<()> {
    let target = target_root.join(module_id).join(rel);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let rel_in_root = format!("{}/{}", module_id, rel);
    if is_text(source) {
        let content = std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        let content = content.replace(FOLDER_TOKEN, opts.folder_name);
        let (content, applied) = markers::apply_feature_markers(&content, opts.features);
        for injection in &applied {
            if injection.enabled {
                report
                    .injected
                    .push((rel_in_root.clone(), injection.marker.clone()));
            }
        }
        std::fs::write(&target, content)
            .with_context(|| format!("Failed to write {}", target.display()))?;
    } else {
        std::fs::copy(source, &target)
            .with_context(|| format!("Failed to copy to {}", target.display()))?;
    }

    on_file_written(WrittenFile {
        path: target,
        kind: kind_for(rel),
        name: name_for(rel),
        module: module_id.to_string(),
        relative_path: rel_in_root,
    });
    Ok(())
}

fn is_text(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_excluded_by_answers(top_dir: &str, answers: Option<&BTreeMap<String, String>>) -> bool {
    answers
        .and_then(|a| a.get(&format!("include_{}", top_dir)))
        .map(|v| v == "false")
        .unwrap_or(false)
}

/// Agents flagged `localskip: true` are web-deployment only
fn is_localskip_agent(path: &Path, rel: &str) -> bool {
    if !rel.starts_with("agents/") || !rel.ends_with(".agent.yaml") {
        return false;
    }
    match compiler::load_definition(path) {
        Ok(def) => def.localskip,
        // Unparseable agents still install; compilation reports the error
        Err(_) => false,
    }
}

fn kind_for(rel: &str) -> FileKind {
    match rel.split('/').next() {
        Some("agents") => FileKind::Agent,
        Some("workflows") => FileKind::Workflow,
        Some("tasks") => FileKind::Task,
        Some("tools") => FileKind::Tool,
        _ => FileKind::File,
    }
}

fn name_for(rel: &str) -> String {
    let file_name = rel.rsplit('/').next().unwrap_or(rel);
    let stem = file_name.strip_suffix(".agent.yaml").unwrap_or_else(|| {
        Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
    });
    stem.to_string()
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

    fn collect_install(
        module: &str,
        source: &Path,
        target: &Path,
        opts: &InstallOptions<'_>,
    ) -> (Vec<WrittenFile>, InstallReport) {
        let mut written = Vec::new();
        let report = install(module, source, target, opts, &mut |f| written.push(f)).unwrap();
        (written, report)
    }

    fn default_opts<'a>(features: &'a FeatureSet) -> InstallOptions<'a> {
        InstallOptions {
            folder_name: "agentpack",
            answers: None,
            features,
            skip_post_install: true,
        }
    }

    #[test]
    fn test_copies_tree_and_reports_every_write() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        let target = temp.path().join("root");
        write(&source, "tasks/review.md", "# Review");
        write(&source, "data/list.csv", "a,b");
        write(&source, "_module-installer/schema.yaml", "never installed");
        write(&source, "sub-modules/claude/cmd.md", "per-IDE payload");
        write(&source, "config-schema.yaml", "prompt driver");

        let features = FeatureSet::new();
        let (written, _) = collect_install("alpha", &source, &target, &default_opts(&features));

        let mut rels: Vec<&str> = written.iter().map(|w| w.relative_path.as_str()).collect();
        rels.sort();
        assert_eq!(rels, vec!["alpha/data/list.csv", "alpha/tasks/review.md"]);
        assert!(target.join("alpha/tasks/review.md").exists());
        assert!(!target.join("alpha/_module-installer").exists());
        assert!(!target.join("alpha/config-schema.yaml").exists());
    }

    #[test]
    fn test_folder_token_substitution_in_text_files() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        let target = temp.path().join("root");
        write(
            &source,
            "tasks/go.md",
            "see {project-root}/{agentpack-folder}/core/tasks/x.md",
        );

        let features = FeatureSet::new();
        let mut opts = default_opts(&features);
        opts.folder_name = "pack";
        collect_install("alpha", &source, &target, &opts);

        let content = std::fs::read_to_string(target.join("alpha/tasks/go.md")).unwrap();
        assert_eq!(content, "see {project-root}/pack/core/tasks/x.md");
    }

    #[test]
    fn test_binary_files_copied_raw() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        let target = temp.path().join("root");
        let bytes: Vec<u8> = vec![0u8, 159, 146, 150, 255];
        std::fs::create_dir_all(source.join("tools")).unwrap();
        std::fs::write(source.join("tools/blob.bin"), &bytes).unwrap();

        let features = FeatureSet::new();
        collect_install("alpha", &source, &target, &default_opts(&features));

        assert_eq!(std::fs::read(target.join("alpha/tools/blob.bin")).unwrap(), bytes);
    }

    #[test]
    fn test_feature_injection_recorded() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        let target = temp.path().join("root");
        write(&source, "tasks/go.md", "steps\n<!-- feature:voice -->\nend\n");

        let mut features = FeatureSet::new();
        features.enable("voice", "say: done");
        let (_, report) = collect_install("alpha", &source, &target, &default_opts(&features));

        assert_eq!(report.injected, vec![("alpha/tasks/go.md".to_string(), "voice".to_string())]);
        let content = std::fs::read_to_string(target.join("alpha/tasks/go.md")).unwrap();
        assert_eq!(content, "steps\nsay: done\nend\n");
    }

    #[test]
    fn test_localskip_agent_not_installed() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        let target = temp.path().join("root");
        write(
            &source,
            "agents/web.agent.yaml",
            "agent:\n  metadata: {id: web, name: Web, title: Web Agent}\n  persona: {role: r, identity: i}\n  localskip: true\n",
        );
        write(
            &source,
            "agents/local.agent.yaml",
            "agent:\n  metadata: {id: local, name: Local, title: Local Agent}\n  persona: {role: r, identity: i}\n",
        );

        let features = FeatureSet::new();
        let (written, _) = collect_install("alpha", &source, &target, &default_opts(&features));

        let rels: Vec<&str> = written.iter().map(|w| w.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["alpha/agents/local.agent.yaml"]);
        assert_eq!(written[0].kind, FileKind::Agent);
        assert_eq!(written[0].name, "local");
    }

    #[test]
    fn test_answers_exclude_top_level_dir() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        let target = temp.path().join("root");
        write(&source, "tasks/go.md", "x");
        write(&source, "templates/report.md", "y");

        let mut answers = BTreeMap::new();
        answers.insert("include_templates".to_string(), "false".to_string());
        let features = FeatureSet::new();
        let mut opts = default_opts(&features);
        opts.answers = Some(&answers);

        let (written, _) = collect_install("alpha", &source, &target, &opts);
        let rels: Vec<&str> = written.iter().map(|w| w.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["alpha/tasks/go.md"]);
    }

    #[test]
    fn test_partial_install_writes_marker_and_skips_missing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/beta");
        let target = temp.path().join("root");
        write(&source, "tasks/lint.md", "# Lint");

        let features = FeatureSet::new();
        let mut written = Vec::new();
        install_partial(
            "beta",
            &source,
            &target,
            &["tasks/lint.md".to_string(), "tasks/gone.md".to_string()],
            &default_opts(&features),
            &mut |f| written.push(f),
        )
        .unwrap();

        assert_eq!(written.len(), 1);
        assert!(target.join("beta/tasks/lint.md").exists());
        assert!(target.join("beta").join(PARTIAL_MARKER).exists());
        assert!(!target.join("beta/tasks/gone.md").exists());
    }

    #[test]
    fn test_post_install_hook_messages_and_docs() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        let target = temp.path().join("root");
        write(
            &source,
            "_module-installer/post-install.yaml",
            "messages:\n  - 'Run *build to get started'\ndocs:\n  - docs/USAGE.md\n",
        );
        write(&source, "_module-installer/docs/USAGE.md", "# Usage");

        let mut written = Vec::new();
        let messages = run_post_install("alpha", &source, &target, &mut |f| written.push(f)).unwrap();

        assert_eq!(messages, vec!["Run *build to get started"]);
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].relative_path, "alpha/USAGE.md");
        assert!(target.join("alpha/USAGE.md").exists());
    }

    #[test]
    fn test_no_hook_is_fine() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/alpha");
        std::fs::create_dir_all(&source).unwrap();
        let messages =
            run_post_install("alpha", &source, temp.path(), &mut |_| {}).unwrap();
        assert!(messages.is_empty());
    }
}
