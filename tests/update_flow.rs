//! Update passes over an existing installation: user edits, custom files,
//! overlay customizations, quick updates, and custom-module orphan handling.

mod common;

use agentpack::manifest::{CustomModuleRecord, ManifestStore};
use agentpack::orchestrator::{InstallAction, OrphanResolution, ScriptedPrompter};
use tempfile::TempDir;

fn installed_fixture() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let pack = temp.path().join("pack");
    let project = temp.path().join("project");
    common::build_pack(&pack);

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    orch.install(&common::config(&project, &["alpha"])).unwrap();
    (temp, pack, project)
}

#[test]
fn update_preserves_user_edit_as_bak_sibling() {
    let (_temp, pack, project) = installed_fixture();
    let tracked = project.join("agentpack/core/tasks/review.md");
    std::fs::write(&tracked, "my local process notes\n").unwrap();

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    let outcome = orch.update(&common::config(&project, &[])).unwrap();

    // Fresh content wins at the real path; the edit survives next to it
    let fresh = std::fs::read_to_string(&tracked).unwrap();
    assert!(fresh.contains("Check the diff"));
    let bak = std::fs::read_to_string(format!("{}.bak", tracked.display())).unwrap();
    assert_eq!(bak, "my local process notes\n");
    assert_eq!(outcome.modified_files, vec![tracked]);
}

#[test]
fn update_leaves_custom_files_untouched() {
    let (_temp, pack, project) = installed_fixture();
    let custom = project.join("agentpack/core/notes/scratch.md");
    std::fs::create_dir_all(custom.parent().unwrap()).unwrap();
    std::fs::write(&custom, "scratchpad\n").unwrap();

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    let outcome = orch.update(&common::config(&project, &[])).unwrap();

    assert_eq!(std::fs::read_to_string(&custom).unwrap(), "scratchpad\n");
    assert!(outcome.custom_files.contains(&custom));
}

#[test]
fn reinstall_restores_custom_files_after_wiping_root() {
    let (_temp, pack, project) = installed_fixture();
    let custom = project.join("agentpack/core/notes/scratch.md");
    std::fs::create_dir_all(custom.parent().unwrap()).unwrap();
    std::fs::write(&custom, "scratchpad\n").unwrap();

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Reinstall));
    let outcome = orch.install(&common::config(&project, &["alpha"])).unwrap();
    assert!(outcome.success);

    // Root was deleted and rebuilt, yet the user file came back
    assert_eq!(std::fs::read_to_string(&custom).unwrap(), "scratchpad\n");
    assert!(project.join("agentpack/core/tasks/review.md").exists());
}

#[test]
fn edited_overlay_shapes_recompiled_agent_and_survives() {
    let (_temp, pack, project) = installed_fixture();
    let overlay = project.join("agentpack/_cfg/agents/dev.customize.yaml");
    let customized = "persona:\n  role: Pirate captain of the build\n";
    std::fs::write(&overlay, customized).unwrap();

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    orch.update(&common::config(&project, &[])).unwrap();

    let compiled =
        std::fs::read_to_string(project.join("agentpack/core/agents/dev.md")).unwrap();
    assert!(compiled.contains("Pirate captain of the build"));
    // The overlay itself was not regenerated over
    assert_eq!(std::fs::read_to_string(&overlay).unwrap(), customized);
}

#[test]
fn quick_update_skips_content_but_bumps_manifest() {
    let (_temp, pack, project) = installed_fixture();
    let tracked = project.join("agentpack/core/tasks/review.md");
    std::fs::write(&tracked, "edited\n").unwrap();

    let mut config = common::config(&project, &[]);
    config.quick_update = true;
    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::QuickUpdate));
    let outcome = orch.update(&config).unwrap();
    assert!(outcome.success);

    // Content untouched: no overwrite, no .bak
    assert_eq!(std::fs::read_to_string(&tracked).unwrap(), "edited\n");
    assert!(!std::path::Path::new(&format!("{}.bak", tracked.display())).exists());

    let manifest = ManifestStore::new(project.join("agentpack"))
        .read_pack_manifest()
        .unwrap();
    assert_eq!(manifest.version, env!("CARGO_PKG_VERSION"));
}

fn register_custom_module(temp: &TempDir, project: &std::path::Path) -> std::path::PathBuf {
    let live = temp.path().join("my-mod");
    common::write(&live, "tasks/custom.md", "# My custom task\n");
    let store = ManifestStore::new(project.join("agentpack"));
    store
        .add_custom_module(CustomModuleRecord {
            id: "my-mod".to_string(),
            name: "My Module".to_string(),
            source_path: live.clone(),
            cached_copy_path: None,
            orphaned: false,
        })
        .unwrap();
    live
}

#[test]
fn custom_module_installs_and_caches_on_update() {
    let (temp, pack, project) = installed_fixture();
    register_custom_module(&temp, &project);

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    orch.update(&common::config(&project, &[])).unwrap();

    let root = project.join("agentpack");
    assert!(root.join("my-mod/tasks/custom.md").exists());

    let manifest = ManifestStore::new(&root).read_pack_manifest().unwrap();
    let record = manifest.custom_module("my-mod").unwrap();
    assert!(!record.orphaned);
    let cached = record.cached_copy_path.clone().unwrap();
    assert!(cached.join("tasks/custom.md").exists());
}

#[test]
fn orphaned_custom_module_kept_from_cache() {
    let (temp, pack, project) = installed_fixture();
    let live = register_custom_module(&temp, &project);

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    orch.update(&common::config(&project, &[])).unwrap();

    // Live source disappears between updates
    std::fs::remove_dir_all(&live).unwrap();

    let mut prompter = ScriptedPrompter::new(InstallAction::Update);
    prompter.orphan.push_back(OrphanResolution::KeepWithoutSource);
    let mut orch = common::scripted(&pack, prompter);
    let outcome = orch.update(&common::config(&project, &[])).unwrap();

    let root = project.join("agentpack");
    assert!(root.join("my-mod/tasks/custom.md").exists());
    let manifest = ManifestStore::new(&root).read_pack_manifest().unwrap();
    assert!(manifest.custom_module("my-mod").unwrap().orphaned);
    assert!(outcome.warnings.iter().any(|w| w.contains("my-mod")));
}

#[test]
fn removed_custom_module_deletes_files_and_record() {
    let (temp, pack, project) = installed_fixture();
    let live = register_custom_module(&temp, &project);

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    orch.update(&common::config(&project, &[])).unwrap();
    std::fs::remove_dir_all(&live).unwrap();

    let mut prompter = ScriptedPrompter::new(InstallAction::Update);
    prompter.orphan.push_back(OrphanResolution::Remove);
    let mut orch = common::scripted(&pack, prompter);
    orch.update(&common::config(&project, &[])).unwrap();

    let root = project.join("agentpack");
    assert!(!root.join("my-mod").exists());
    assert!(!root.join("_cfg/custom-cache/my-mod").exists());
    let manifest = ManifestStore::new(&root).read_pack_manifest().unwrap();
    assert!(manifest.custom_module("my-mod").is_none());
    // Bundled modules unaffected
    assert!(root.join("core/tasks/review.md").exists());
}

#[test]
fn sourceless_custom_module_survives_without_cache() {
    let (temp, pack, project) = installed_fixture();
    let live = register_custom_module(&temp, &project);

    let mut orch = common::scripted(&pack, ScriptedPrompter::new(InstallAction::Update));
    orch.update(&common::config(&project, &[])).unwrap();

    // Both the live source and the cached copy are gone
    let root = project.join("agentpack");
    std::fs::remove_dir_all(&live).unwrap();
    std::fs::remove_dir_all(root.join("_cfg/custom-cache/my-mod")).unwrap();

    let mut prompter = ScriptedPrompter::new(InstallAction::Update);
    prompter.orphan.push_back(OrphanResolution::KeepWithoutSource);
    let mut orch = common::scripted(&pack, prompter);
    let outcome = orch.update(&common::config(&project, &[])).unwrap();

    // Installed files stay put and stay tracked; the record is flagged
    assert!(root.join("my-mod/tasks/custom.md").exists());
    let manifest = ManifestStore::new(&root).read_pack_manifest().unwrap();
    assert!(manifest.custom_module("my-mod").unwrap().orphaned);
    let entries = ManifestStore::new(&root).read_files_manifest();
    assert!(entries
        .iter()
        .any(|e| e.relative_path == "my-mod/tasks/custom.md"));
    assert!(outcome.warnings.iter().any(|w| w.contains("my-mod")));
}
