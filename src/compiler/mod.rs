//! AgentCompiler - turn a declarative agent definition plus an optional
//! customization overlay into the final renderable artifact.
//!
//! The compiled artifact always embeds the same fixed activation protocol
//! (load persona, load shared config, bind user identity, run critical
//! actions, enter the menu loop). Module-specific behavior is expressed only
//! through menu items and critical-action steps; nothing may alter the
//! activation contract itself.

pub mod menu;

pub use menu::{match_menu_input, MenuMatch};

use crate::markers::{self, FeatureSet};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

const ACTIVATION_TEMPLATE: &str = include_str!("../../templates/activation.md");

/// Explanatory blocks for menu-handler kinds; only the kinds actually
/// referenced by this agent's menu are emitted
const HANDLER_DOCS: &[(&str, &str)] = &[
    (
        "workflow",
        "- `workflow` items: load the referenced workflow file and execute its steps in order, reporting progress after each step.",
    ),
    (
        "task",
        "- `task` items: load the referenced task file and carry out its instructions as a single unit of work.",
    ),
    (
        "action",
        "- `action` items: perform the inline instruction directly; no external file is involved.",
    ),
];

// =============================================================================
// Agent definition (the .agent.yaml source)
// =============================================================================

/// Top-level document of an `.agent.yaml` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinitionFile {
    pub agent: AgentDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub metadata: AgentMetadata,
    pub persona: Persona,
    #[serde(default)]
    pub critical_actions: Vec<String>,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
    #[serde(default)]
    pub prompts: Vec<String>,
    /// Agent needs a sidecar folder next to its compiled artifact
    #[serde(default)]
    pub sidecar: bool,
    /// Web-deployment only; never installed into a local project
    #[serde(default)]
    pub localskip: bool,
}

/// Authored identity; never overridden at install time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub communication_style: String,
    #[serde(default)]
    pub principles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    /// Label the user types, conventionally `*`-prefixed (e.g. "*build")
    pub trigger: String,
    pub description: String,
    #[serde(default)]
    pub handler: Option<MenuHandler>,
}

/// Handler payload of a menu item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MenuHandler {
    Workflow { workflow: String },
    Task { task: String },
    Action { action: String },
}

impl MenuHandler {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Workflow { .. } => "workflow",
            Self::Task { .. } => "task",
            Self::Action { .. } => "action",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Workflow { workflow } => workflow,
            Self::Task { task } => task,
            Self::Action { action } => action,
        }
    }
}

/// Parse an `.agent.yaml` definition
pub fn parse_definition(content: &str) -> Result<AgentDefinition> {
    let file: AgentDefinitionFile =
        serde_yaml::from_str(content).context("Failed to parse agent definition")?;
    Ok(file.agent)
}

pub fn load_definition(path: &Path) -> Result<AgentDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read agent definition {}", path.display()))?;
    parse_definition(&content)
}

// =============================================================================
// Customization overlay (the .customize.yaml sidecar)
// =============================================================================

/// User overlay; only explicit non-empty fields override the base definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomizeOverlay {
    #[serde(default)]
    pub persona: PersonaOverlay,
    #[serde(default)]
    pub critical_actions: Vec<String>,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
    #[serde(default)]
    pub prompts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaOverlay {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub communication_style: Option<String>,
    #[serde(default)]
    pub principles: Vec<String>,
}

impl CustomizeOverlay {
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse customization overlay")
    }

    /// The default overlay written next to every compiled agent: all fields
    /// empty, so it overrides nothing until the user edits it
    pub fn default_yaml() -> String {
        "# Customization overlay. Non-empty fields here override the agent's\n\
         # base definition; empty fields fall back to the base.\n\
         persona:\n\
         \x20 role: \"\"\n\
         \x20 identity: \"\"\n\
         \x20 communication_style: \"\"\n\
         \x20 principles: []\n\
         critical_actions: []\n\
         menu: []\n\
         prompts: []\n"
            .to_string()
    }
}

/// Field-by-field merge: a populated base field survives unless the overlay
/// carries an explicit non-empty value for it
fn merge(base: &AgentDefinition, overlay: &CustomizeOverlay) -> AgentDefinition {
    let mut merged = base.clone();

    let override_str = |target: &mut String, value: &Option<String>| {
        if let Some(v) = value {
            if !v.trim().is_empty() {
                *target = v.clone();
            }
        }
    };
    override_str(&mut merged.persona.role, &overlay.persona.role);
    override_str(&mut merged.persona.identity, &overlay.persona.identity);
    override_str(
        &mut merged.persona.communication_style,
        &overlay.persona.communication_style,
    );
    if !overlay.persona.principles.is_empty() {
        merged.persona.principles = overlay.persona.principles.clone();
    }
    if !overlay.critical_actions.is_empty() {
        merged.critical_actions = overlay.critical_actions.clone();
    }
    if !overlay.menu.is_empty() {
        merged.menu = overlay.menu.clone();
    }
    if !overlay.prompts.is_empty() {
        merged.prompts = overlay.prompts.clone();
    }

    merged
}

// =============================================================================
// Compilation
// =============================================================================

/// Metadata extracted from the compiled artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMetadata {
    pub id: String,
    pub name: String,
    pub title: String,
    pub icon: Option<String>,
}

/// Final renderable artifact plus its extracted metadata
#[derive(Debug, Clone)]
pub struct CompiledAgent {
    /// File name the artifact is written under (install-time choice)
    pub file_name: String,
    pub content: String,
    pub metadata: CompiledMetadata,
    /// Agent requires a sidecar folder next to the artifact
    pub sidecar: bool,
}

/// Compile an agent definition with an optional overlay.
///
/// `final_name` is the installation-time file name only; identity fields
/// (id, display name, title) always come from the base definition's
/// metadata — the persona's name is authored, not an install-time choice.
pub fn compile(
    base: &AgentDefinition,
    overlay: Option<&CustomizeOverlay>,
    final_name: &str,
    folder: &str,
    features: &FeatureSet,
) -> CompiledAgent {
    let merged = match overlay {
        Some(overlay) => merge(base, overlay),
        None => base.clone(),
    };

    let metadata = CompiledMetadata {
        id: base.metadata.id.clone(),
        name: base.metadata.name.clone(),
        title: base.metadata.title.clone(),
        icon: base.metadata.icon.clone(),
    };

    let mut content = String::new();
    content.push_str("---\n");
    content.push_str(&format!("id: {}\n", metadata.id));
    content.push_str(&format!("name: {}\n", metadata.name));
    content.push_str(&format!("title: {}\n", metadata.title));
    if let Some(icon) = &metadata.icon {
        content.push_str(&format!("icon: {}\n", icon));
    }
    content.push_str("generated: true\n");
    content.push_str("---\n\n");

    let heading_icon = metadata.icon.as_deref().map(|i| format!("{} ", i)).unwrap_or_default();
    content.push_str(&format!("# {}{}\n\n", heading_icon, metadata.title));
    content.push_str(
        "<!-- Compiled agent. Do not edit; edit the .agent.yaml source or the\n     customization overlay in _cfg/agents/ and recompile. -->\n\n",
    );

    content.push_str("## Persona\n\n");
    content.push_str(&format!("- Role: {}\n", merged.persona.role));
    content.push_str(&format!("- Identity: {}\n", merged.persona.identity));
    if !merged.persona.communication_style.is_empty() {
        content.push_str(&format!(
            "- Communication style: {}\n",
            merged.persona.communication_style
        ));
    }
    if !merged.persona.principles.is_empty() {
        content.push_str("- Principles:\n");
        for principle in &merged.persona.principles {
            content.push_str(&format!("  - {}\n", principle));
        }
    }
    content.push('\n');

    if !merged.prompts.is_empty() {
        content.push_str("## Prompts\n\n");
        for prompt in &merged.prompts {
            content.push_str(&format!("- {}\n", prompt));
        }
        content.push('\n');
    }

    if merged.sidecar {
        content.push_str(&format!(
            "## Sidecar\n\nThis agent keeps working files in `{{project-root}}/{}/{}-sidecar/`. Create the folder if it does not exist.\n\n",
            folder, metadata.id
        ));
    }

    content.push_str(&render_activation(&merged, folder));

    let (content, _) = markers::apply_feature_markers(&content, features);

    CompiledAgent {
        file_name: format!("{}.md", final_name),
        content,
        metadata,
        sidecar: merged.sidecar,
    }
}

fn render_activation(agent: &AgentDefinition, folder: &str) -> String {
    let critical_actions = if agent.critical_actions.is_empty() {
        " (none declared)".to_string()
    } else {
        let mut block = String::new();
        for action in &agent.critical_actions {
            block.push_str(&format!("\n   - {}", action));
        }
        block
    };

    let mut menu_block = String::new();
    for (i, item) in agent.menu.iter().enumerate() {
        let handler = item
            .handler
            .as_ref()
            .map(|h| format!(" ({}: `{}`)", h.kind(), h.value()))
            .unwrap_or_default();
        menu_block.push_str(&format!(
            "{}. `{}` - {}{}\n",
            i + 1,
            item.trigger,
            item.description,
            handler
        ));
    }
    if menu_block.is_empty() {
        menu_block.push_str("(this agent has no menu items)\n");
    }

    // Handler docs only for kinds actually referenced by this menu
    let used_kinds: BTreeSet<&str> = agent
        .menu
        .iter()
        .filter_map(|item| item.handler.as_ref())
        .map(|h| h.kind())
        .collect();
    let mut handlers = String::new();
    for (kind, doc) in HANDLER_DOCS {
        if used_kinds.contains(kind) {
            handlers.push_str(doc);
            handlers.push('\n');
        }
    }
    if !handlers.is_empty() {
        handlers = format!("\n## Menu handlers\n\n{}", handlers);
    }

    markers::render(
        ACTIVATION_TEMPLATE,
        &[
            ("folder", folder),
            ("agent_name", &agent.metadata.name),
            ("critical_actions", &critical_actions),
            ("menu", menu_block.trim_end()),
            ("handlers", handlers.trim_end()),
        ],
    )
}
