//! Shared fixtures: a small bundled pack with three modules and a scripted
//! orchestrator to drive install/update passes non-interactively.
#![allow(dead_code)]

use agentpack::config::InstallConfig;
use agentpack::orchestrator::{InstallOrchestrator, MemStaging, ScriptedPrompter};
use agentpack::source::BundledSource;
use std::path::Path;

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
}

/// Bundled pack: core (one agent, one task), alpha (workflow referencing a
/// beta task), beta (two tasks, only one referenced).
pub fn build_pack(source_root: &Path) {
    write(
        source_root,
        "core/agents/dev.agent.yaml",
        r#"agent:
  metadata:
    id: dev
    name: Devon
    title: Developer Agent
    icon: "💻"
  persona:
    role: Senior software engineer
    identity: Pragmatic implementer who ships small, reviewed changes
  critical_actions:
    - "Read {project-root}/agentpack/core/tasks/review.md"
  menu:
    - trigger: "*build"
      description: Build the project
      handler:
        workflow: "{project-root}/agentpack/alpha/workflows/build/workflow.yaml"
    - trigger: "*review"
      description: Review recent changes
      handler:
        task: "{project-root}/agentpack/core/tasks/review.md"
"#,
    );
    write(source_root, "core/tasks/review.md", "# Review\n\nCheck the diff.\n");
    write(
        source_root,
        "alpha/workflows/build/workflow.yaml",
        "steps:\n  - run: '{project-root}/agentpack/beta/tasks/lint.md'\n",
    );
    write(source_root, "alpha/templates/report.md", "# Report template\n");
    write(source_root, "beta/tasks/lint.md", "# Lint\n");
    write(source_root, "beta/tasks/unrelated.md", "# Unrelated\n");
}

pub fn scripted(pack: &Path, prompter: ScriptedPrompter) -> InstallOrchestrator {
    InstallOrchestrator::new(
        BundledSource::new(pack),
        Box::new(prompter),
        Box::new(MemStaging::new()),
    )
}

pub fn config(project: &Path, modules: &[&str]) -> InstallConfig {
    let mut config = InstallConfig::new(project);
    config.modules = modules.iter().map(|m| m.to_string()).collect();
    config
}
