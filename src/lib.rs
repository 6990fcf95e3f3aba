// Agentpack - Installer and updater for modular agent packs
// Scaffolds a target project with versioned modules (agents, workflows, tasks)
// and keeps them in sync across updates via manifest-driven reconciliation.

pub mod cli;
pub mod compiler;
pub mod config;
pub mod hashing;
pub mod ide;
pub mod installer;
pub mod manifest;
pub mod markers;
pub mod orchestrator;
pub mod reconcile;
pub mod resolver;
pub mod source;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use config::{InstallConfig, InstallOutcome, InstalledState};
pub use manifest::{FileKind, ManifestEntry, ManifestStore};
pub use orchestrator::InstallOrchestrator;
pub use reconcile::Reconciliation;
