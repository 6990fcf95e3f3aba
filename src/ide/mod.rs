//! Per-IDE adapters behind a static registry.
//!
//! The core never hard-codes IDE file formats; it calls each selected
//! adapter once per pass through this narrow contract and persists whatever
//! configuration the adapter returns. Adapters are resolved from a fixed
//! strategy table at startup, never by constructing type names from strings.

use crate::manifest::IdeConfig;
use crate::Result;
use std::path::{Path, PathBuf};

/// A compiled agent as the adapters see it
#[derive(Debug, Clone)]
pub struct AgentArtifact {
    pub module: String,
    pub id: String,
    pub title: String,
    /// Path of the compiled artifact relative to the install root
    pub relative_path: String,
}

/// Everything an adapter may consult during setup
pub struct IdeSetupContext<'a> {
    pub project_dir: &'a Path,
    pub install_root: &'a Path,
    pub folder_name: &'a str,
    pub selected_modules: &'a [String],
    pub agents: &'a [AgentArtifact],
    /// Configuration collected on a previous pass, if any
    pub config: &'a IdeConfig,
}

/// What an adapter reports back after setup
#[derive(Debug, Clone, Default)]
pub struct IdeSetupReport {
    pub success: bool,
    /// Command/launcher files written
    pub count: usize,
    /// Configuration to persist for the next pass
    pub config: Option<IdeConfig>,
}

/// One supported IDE
pub trait IdeAdapter: Sync {
    fn id(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn setup(&self, ctx: &IdeSetupContext<'_>) -> Result<IdeSetupReport>;
}

/// Fixed adapter table; extend by adding a struct and a row here
static ADAPTERS: &[&dyn IdeAdapter] = &[&ClaudeCodeAdapter, &CursorAdapter, &CodexAdapter];

pub fn adapter_for(id: &str) -> Option<&'static dyn IdeAdapter> {
    ADAPTERS.iter().find(|a| a.id() == id).copied()
}

pub fn supported_ides() -> Vec<&'static str> {
    ADAPTERS.iter().map(|a| a.id()).collect()
}

/// Write one launcher file per agent under `dir`, pointing back at the
/// compiled artifact in the install root. This is all the built-in adapters
/// do; anything format-specific beyond that belongs outside the core.
fn write_launchers(
    ctx: &IdeSetupContext<'_>,
    dir: &Path,
    extension: &str,
) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut count = 0;
    for agent in ctx.agents {
        let content = format!(
            "Load the agent definition at `{{project-root}}/{}/{}` and follow its activation instructions exactly.\n",
            ctx.folder_name, agent.relative_path
        );
        let path = dir.join(format!("{}.{}", agent.id, extension));
        std::fs::write(&path, content)?;
        count += 1;
    }
    Ok(count)
}

fn configured_dir(ctx: &IdeSetupContext<'_>, key: &str, default: &str) -> PathBuf {
    let dir = ctx.config.get(key).map(String::as_str).unwrap_or(default);
    ctx.project_dir.join(dir)
}

struct ClaudeCodeAdapter;

impl IdeAdapter for ClaudeCodeAdapter {
    fn id(&self) -> &'static str {
        "claude-code"
    }

    fn display_name(&self) -> &'static str {
        "Claude Code"
    }

    fn setup(&self, ctx: &IdeSetupContext<'_>) -> Result<IdeSetupReport> {
        let dir = configured_dir(ctx, "commands_dir", ".claude/commands/agentpack");
        let count = write_launchers(ctx, &dir, "md")?;

        let mut config = ctx.config.clone();
        config
            .entry("commands_dir".to_string())
            .or_insert_with(|| ".claude/commands/agentpack".to_string());

        Ok(IdeSetupReport {
            success: true,
            count,
            config: Some(config),
        })
    }
}

struct CursorAdapter;

impl IdeAdapter for CursorAdapter {
    fn id(&self) -> &'static str {
        "cursor"
    }

    fn display_name(&self) -> &'static str {
        "Cursor"
    }

    fn setup(&self, ctx: &IdeSetupContext<'_>) -> Result<IdeSetupReport> {
        let dir = configured_dir(ctx, "rules_dir", ".cursor/rules/agentpack");
        let count = write_launchers(ctx, &dir, "mdc")?;

        let mut config = ctx.config.clone();
        config
            .entry("rules_dir".to_string())
            .or_insert_with(|| ".cursor/rules/agentpack".to_string());

        Ok(IdeSetupReport {
            success: true,
            count,
            config: Some(config),
        })
    }
}

struct CodexAdapter;

impl IdeAdapter for CodexAdapter {
    fn id(&self) -> &'static str {
        "codex"
    }

    fn display_name(&self) -> &'static str {
        "Codex"
    }

    fn setup(&self, ctx: &IdeSetupContext<'_>) -> Result<IdeSetupReport> {
        let dir = configured_dir(ctx, "prompts_dir", ".codex/prompts");
        let count = write_launchers(ctx, &dir, "md")?;

        let mut config = ctx.config.clone();
        config
            .entry("prompts_dir".to_string())
            .or_insert_with(|| ".codex/prompts".to_string());

        Ok(IdeSetupReport {
            success: true,
            count,
            config: Some(config),
        })
    }
}
