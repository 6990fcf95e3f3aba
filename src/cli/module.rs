//! Custom-module registry commands

use crate::manifest::{CustomModuleRecord, ManifestStore};
use crate::orchestrator::{DialoguerPrompter, Prompter};
use crate::source::{BundledSource, SourceLookup};
use crate::Result;
use anyhow::Context;
use clap::Subcommand;
use colored::Colorize;
use std::env;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ModuleCommands {
    /// Register a custom module from a source directory
    Add {
        /// Path to the module's source directory
        path: PathBuf,

        /// Module id (defaults to the directory name)
        #[arg(long)]
        id: Option<String>,
    },

    /// Remove a custom module and its installed files
    Remove {
        /// Module id to remove
        id: String,
    },

    /// List installed and bundled modules
    List,
}

pub async fn run(cmd: ModuleCommands, dir: Option<&str>, folder: &str) -> Result<()> {
    let target_dir = match dir {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };
    let root = target_dir.join(folder);
    let store = ManifestStore::new(&root);

    match cmd {
        ModuleCommands::Add { path, id } => {
            if !store.is_installed() {
                anyhow::bail!(
                    "No installation at {}; run `agentpack install` first",
                    root.display()
                );
            }
            let source_path = path
                .canonicalize()
                .with_context(|| format!("Module source not found: {}", path.display()))?;
            if !source_path.is_dir() {
                anyhow::bail!("Module source is not a directory: {}", source_path.display());
            }

            let id = match id {
                Some(id) => id,
                None => source_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_string())
                    .context("Cannot derive a module id from the source path")?,
            };

            store.add_custom_module(CustomModuleRecord {
                id: id.clone(),
                name: id.clone(),
                source_path,
                cached_copy_path: None,
                orphaned: false,
            })?;

            println!("{}", format!("✅ Registered custom module '{}'", id).green());
            println!("   Run {} to install it", "agentpack update".cyan());
        }

        ModuleCommands::Remove { id } => {
            let mut prompter = DialoguerPrompter;
            if !prompter.confirm_typed(
                &format!("Remove '{}' and delete its installed files?", id),
                &id,
            )? {
                println!("{}", "Removal cancelled.".yellow());
                return Ok(());
            }

            let module_dir = root.join(&id);
            if module_dir.exists() {
                std::fs::remove_dir_all(&module_dir)
                    .with_context(|| format!("Failed to remove {}", module_dir.display()))?;
            }
            let cache_dir = store.custom_cache_dir(&id);
            if cache_dir.exists() {
                std::fs::remove_dir_all(&cache_dir)?;
            }

            if store.remove_custom_module(&id)? {
                println!("{}", format!("✅ Removed custom module '{}'", id).green());
            } else {
                println!(
                    "{}",
                    format!("No custom module '{}' registered", id).yellow()
                );
            }
        }

        ModuleCommands::List => {
            let pack = store.read_pack_manifest();

            println!("{}", "📦 Modules".cyan().bold());
            println!();
            if let Some(pack) = &pack {
                for module in &pack.modules {
                    let marker = if module.partial {
                        " (dependency-only)".bright_black().to_string()
                    } else {
                        String::new()
                    };
                    println!("   {} {}{}", "✓".green(), module.id, marker);
                }
                for custom in &pack.custom_modules {
                    let note = if custom.orphaned {
                        " (source unreachable)".yellow().to_string()
                    } else {
                        format!(" ({})", custom.source_path.display())
                            .bright_black()
                            .to_string()
                    };
                    println!("   {} {}{}", "✚".cyan(), custom.id, note);
                }
            } else {
                println!("   {}", "nothing installed".yellow());
            }

            if let Ok(bundled) = BundledSource::discover() {
                let installed: Vec<String> = pack
                    .map(|p| p.modules.iter().map(|m| m.id.clone()).collect())
                    .unwrap_or_default();
                let available: Vec<String> = bundled
                    .module_ids()
                    .into_iter()
                    .filter(|id| !installed.contains(id))
                    .collect();
                if !available.is_empty() {
                    println!();
                    println!("   Available: {}", available.join(", ").bright_black());
                }
            }
        }
    }
    Ok(())
}
