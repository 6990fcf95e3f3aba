//! InstallOrchestrator - drives a full install/update pass as an explicit
//! phase sequence.
//!
//! Phases run strictly in order: Detecting, ChooseAction, Reconciling,
//! BackingUp, InstallingCore, ResolvingDependencies, InstallingModules,
//! RegeneratingManifests, ConfiguringIdes, RunningModuleHooks,
//! RestoringUserFiles, Summarizing. A failure while the tree is being
//! rewritten keeps the backup directory on disk and reports its location.
//!
//! All interaction goes through the injected `Prompter`, all backup I/O
//! through the injected `Staging`, and all module sources through
//! `SourceLookup`; the orchestrator itself holds no ambient mutable state
//! beyond the `InstallConfig` value threaded through each pass.

pub mod prompter;
pub mod staging;

pub use prompter::{
    DialoguerPrompter, InstallAction, OrphanResolution, Prompter, ScriptedPrompter,
};
pub use staging::{FsStaging, MemStaging, Staging};

use crate::compiler::{self, CustomizeOverlay};
use crate::config::{InstallConfig, InstallOutcome, InstalledState};
use crate::hashing;
use crate::ide::{self, AgentArtifact, IdeSetupContext};
use crate::installer::{self, InstallOptions, WrittenFile};
use crate::manifest::{
    CustomModuleRecord, ManifestEntry, ManifestStore, ModuleRecord, ModuleSource, PackManifest,
    AGENTS_CFG_DIR, CFG_DIR, MODULE_CONFIG_FILE,
};
use crate::markers::FeatureSet;
use crate::reconcile::{self, Reconciliation};
use crate::resolver;
use crate::source::{
    refresh_custom_cache, resolve_custom_source, BundledSource, CustomSourceState, PackSource,
    SourceLookup,
};
use crate::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const INSTALLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reconciling,
    BackingUp,
    InstallingCore,
    ResolvingDependencies,
    InstallingModules,
    RegeneratingManifests,
    ConfiguringIdes,
    RunningModuleHooks,
    RestoringUserFiles,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Reconciling => "🔍 Reconciling installed files...",
            Phase::BackingUp => "📦 Backing up user files...",
            Phase::InstallingCore => "📁 Installing core module...",
            Phase::ResolvingDependencies => "🔗 Resolving cross-module dependencies...",
            Phase::InstallingModules => "📁 Installing modules...",
            Phase::RegeneratingManifests => "📝 Regenerating manifests...",
            Phase::ConfiguringIdes => "🖥  Configuring IDEs...",
            Phase::RunningModuleHooks => "🪝 Running module hooks...",
            Phase::RestoringUserFiles => "♻️  Restoring user files...",
        }
    }
}

fn announce(phase: Phase) {
    println!("{}", phase.label().cyan());
}

/// What happens to a custom module on this pass
enum CustomDisposition {
    /// Install from this source directory (live or cached)
    Install(PathBuf),
    /// Keep installed files and registry record; nothing to install from
    Keep,
    /// Module removed at the user's request
    Remove,
}

/// Per-module generated `config.yaml`, rewritten every pass
#[derive(Debug, Serialize)]
struct ModuleConfig<'a> {
    module: &'a str,
    folder: &'a str,
    generated: bool,
    answers: &'a BTreeMap<String, String>,
}

pub struct InstallOrchestrator {
    bundled: BundledSource,
    prompter: Box<dyn Prompter>,
    staging: Box<dyn Staging>,
}

impl InstallOrchestrator {
    pub fn new(
        bundled: BundledSource,
        prompter: Box<dyn Prompter>,
        staging: Box<dyn Staging>,
    ) -> Self {
        Self {
            bundled,
            prompter,
            staging,
        }
    }

    /// Interactive orchestrator backed by the terminal and a temp directory
    pub fn with_defaults(bundled: BundledSource) -> Result<Self> {
        Ok(Self::new(
            bundled,
            Box::new(DialoguerPrompter),
            Box::new(FsStaging::new()?),
        ))
    }

    /// Install into `config.target_dir`, prompting over an existing
    /// installation unless `force_reinstall` is set. Over an existing
    /// installation, module and IDE selections the config does not name
    /// default to what the manifest records.
    pub fn install(&mut self, config: &InstallConfig) -> Result<InstallOutcome> {
        let store = ManifestStore::new(config.install_root());
        let mut config = config.clone();

        let action = if !store.is_installed() {
            InstallAction::Update
        } else {
            let previous = store.read_pack_manifest();
            if let Some(pack) = &previous {
                merge_previous_selection(&mut config, pack);
            }
            if config.force_reinstall {
                InstallAction::Reinstall
            } else {
                let installed = previous
                    .map(|m| m.version)
                    .unwrap_or_else(|| "unknown".to_string());
                self.prompter.choose_action(&installed, INSTALLER_VERSION)?
            }
        };

        self.dispatch(&config, &store, action)
    }

    /// Update an existing installation, deriving module and IDE selections
    /// from the manifest when the config does not name them.
    pub fn update(&mut self, config: &InstallConfig) -> Result<InstallOutcome> {
        let store = ManifestStore::new(config.install_root());
        if !store.is_installed() {
            anyhow::bail!(
                "No installation found at {}; run `agentpack install` first",
                store.root().display()
            );
        }

        let mut config = config.clone();
        let previous = store.read_pack_manifest();
        if let Some(pack) = &previous {
            merge_previous_selection(&mut config, pack);
        }

        let installed_version = previous
            .map(|m| m.version)
            .unwrap_or_else(|| "unknown".to_string());
        let action = if versions_match(&installed_version, INSTALLER_VERSION) {
            if config.quick_update {
                InstallAction::QuickUpdate
            } else {
                self.prompter
                    .choose_action(&installed_version, INSTALLER_VERSION)?
            }
        } else {
            InstallAction::Update
        };

        self.dispatch(&config, &store, action)
    }

    /// Recompile agents and refresh IDE artifacts without touching module
    /// content.
    pub fn compile(&mut self, config: &InstallConfig) -> Result<InstallOutcome> {
        let store = ManifestStore::new(config.install_root());
        if !store.is_installed() {
            anyhow::bail!("No installation found at {}", store.root().display());
        }
        let mut config = config.clone();
        if let Some(pack) = store.read_pack_manifest() {
            merge_previous_selection(&mut config, &pack);
        }
        self.dispatch(&config, &store, InstallAction::CompileOnly)
    }

    /// Remove an installation after surfacing what would be lost.
    pub fn uninstall(&mut self, target_dir: &Path, folder_name: &str) -> Result<InstallOutcome> {
        let root = target_dir.join(folder_name);
        let store = ManifestStore::new(&root);
        let mut outcome = InstallOutcome {
            path: root.clone(),
            ..Default::default()
        };

        if !root.exists() {
            println!("{}", "Nothing installed here.".yellow());
            return Ok(outcome);
        }

        let pack = store.read_pack_manifest();
        let overlay_hashes = pack.map(|m| m.overlay_hashes).unwrap_or_default();
        let previous = store.read_files_manifest();
        let found = reconcile::detect(&root, &previous, &overlay_hashes);
        if !found.custom_files.is_empty() {
            println!(
                "{}",
                format!(
                    "⚠ {} user file(s) under {} will be deleted:",
                    found.custom_files.len(),
                    root.display()
                )
                .yellow()
            );
            for path in &found.custom_files {
                println!("   {}", path.display());
            }
        }

        if !self
            .prompter
            .confirm(&format!("Delete {}?", root.display()), false)?
        {
            println!("{}", "Uninstall cancelled.".yellow());
            return Ok(outcome);
        }

        std::fs::remove_dir_all(&root)
            .with_context(|| format!("Failed to remove {}", root.display()))?;
        println!("{}", "✅ Uninstalled.".green().bold());
        outcome.success = true;
        Ok(outcome)
    }

    /// Snapshot of what is installed, for `agentpack status`
    pub fn get_status(target_dir: &Path, folder_name: &str) -> InstalledState {
        let root = target_dir.join(folder_name);
        let store = ManifestStore::new(&root);
        if !store.is_installed() {
            return InstalledState::not_installed(&root);
        }

        let file_count = store.read_files_manifest().len();
        match store.read_pack_manifest() {
            Some(pack) => InstalledState {
                installed: true,
                path: root,
                version: Some(pack.version),
                modules: pack.modules.iter().map(|m| m.id.clone()).collect(),
                ides: pack.ides,
                custom_modules: pack.custom_modules.iter().map(|m| m.id.clone()).collect(),
                file_count,
            },
            None => InstalledState {
                installed: true,
                path: root,
                version: None,
                modules: Vec::new(),
                ides: Vec::new(),
                custom_modules: Vec::new(),
                file_count,
            },
        }
    }

    fn dispatch(
        &mut self,
        config: &InstallConfig,
        store: &ManifestStore,
        action: InstallAction,
    ) -> Result<InstallOutcome> {
        match action {
            InstallAction::Cancel => {
                println!("{}", "Cancelled.".yellow());
                Ok(InstallOutcome {
                    path: config.install_root(),
                    ..Default::default()
                })
            }
            InstallAction::QuickUpdate | InstallAction::CompileOnly => {
                self.run_refresh(config, store)
            }
            InstallAction::Update | InstallAction::Reinstall => {
                let result = self.run_full(config, store, action == InstallAction::Reinstall);
                if result.is_err() {
                    if let Some(kept) = self.staging.keep() {
                        eprintln!(
                            "{}",
                            format!("⚠ Backed-up user files kept at {}", kept.display()).yellow()
                        );
                    }
                }
                result
            }
        }
    }

    /// Full pass: reconcile, back up, rewrite module content, regenerate
    /// everything, restore user files.
    fn run_full(
        &mut self,
        config: &InstallConfig,
        store: &ManifestStore,
        reinstall: bool,
    ) -> Result<InstallOutcome> {
        let root = config.install_root();
        let modules = config.effective_modules();

        // Reconciling
        announce(Phase::Reconciling);
        let previous_pack = store.read_pack_manifest();
        let previous_entries = store.read_files_manifest();
        let overlay_hashes = previous_pack
            .as_ref()
            .map(|p| p.overlay_hashes.clone())
            .unwrap_or_default();
        let found = reconcile::detect(&root, &previous_entries, &overlay_hashes);

        // The configured IDE list survives a reinstall even when the root is
        // about to be deleted
        let ide_ids: Vec<String> = if config.ides.is_empty() {
            previous_pack
                .as_ref()
                .map(|p| p.ides.clone())
                .unwrap_or_default()
        } else {
            config.ides.clone()
        };

        // Custom modules: resolve sources, refresh caches, handle orphans
        let mut warnings = Vec::new();
        let mut custom_records = previous_pack
            .as_ref()
            .map(|p| p.custom_modules.clone())
            .unwrap_or_default();
        let mut source = PackSource::new(BundledSource::new(self.bundled.root()));
        let mut removed_custom = Vec::new();
        let mut kept_custom = Vec::new();
        for record in &mut custom_records {
            match self.resolve_custom(record, store, &root, &mut warnings)? {
                CustomDisposition::Install(dir) => source.add_custom(&record.id, dir),
                CustomDisposition::Keep => kept_custom.push(record.id.clone()),
                CustomDisposition::Remove => removed_custom.push(record.id.clone()),
            }
        }
        custom_records.retain(|r| !removed_custom.contains(&r.id));
        let mut modules: Vec<String> = modules
            .into_iter()
            .filter(|id| !removed_custom.contains(id) && !kept_custom.contains(id))
            .collect();
        for record in &custom_records {
            if source.is_custom(&record.id) && !modules.contains(&record.id) {
                modules.push(record.id.clone());
            }
        }

        // BackingUp
        announce(Phase::BackingUp);
        for path in &found.custom_files {
            if let Ok(rel) = path.strip_prefix(&root) {
                self.staging
                    .stash(&rel.to_string_lossy().replace('\\', "/"), path)?;
            }
        }
        for modified in &found.modified_files {
            self.staging.stash(&modified.relative_path, &modified.path)?;
        }
        // Files of kept sourceless modules cannot be reinstalled, so they
        // ride through the pass in the backup as well
        for entry in &previous_entries {
            if is_under_any(&entry.relative_path, &kept_custom) {
                let path = root.join(&entry.relative_path);
                if path.is_file() {
                    self.staging.stash(&entry.relative_path, &path)?;
                }
            }
        }

        if reinstall && root.exists() {
            std::fs::remove_dir_all(&root)
                .with_context(|| format!("Failed to remove {}", root.display()))?;
        }

        // InstallingCore + InstallingModules
        announce(Phase::InstallingCore);
        let features = load_features(&self.bundled, &config.features);
        let mut entries: Vec<ManifestEntry> = Vec::new();
        let mut collect = collector(&mut entries);

        let bar = ProgressBar::new(modules.len() as u64);
        bar.set_style(ProgressStyle::default_bar());
        for (i, module_id) in modules.iter().enumerate() {
            if i == 1 {
                announce(Phase::InstallingModules);
            }
            let Some(module_dir) = source.module_dir(module_id) else {
                warnings.push(format!("Module '{}' not found in any source", module_id));
                eprintln!(
                    "{}",
                    format!("⚠ Module '{}' not found, skipped", module_id).yellow()
                );
                bar.inc(1);
                continue;
            };
            let opts = InstallOptions {
                folder_name: &config.folder_name,
                answers: config.answers.get(module_id.as_str()),
                features: &features,
                skip_post_install: true,
            };
            installer::install(module_id, &module_dir, &root, &opts, &mut collect)?;
            write_module_config(&root, module_id, config)?;
            bar.inc(1);
        }
        bar.finish_and_clear();
        drop(collect);

        // ResolvingDependencies
        announce(Phase::ResolvingDependencies);
        let resolved = resolver::resolve(self.bundled.root(), &modules, &config.folder_name)?;
        let mut partial_modules = Vec::new();
        {
            let mut collect = collector(&mut entries);
            for (dep_module, bucket) in &resolved.by_module {
                if bucket.is_empty() {
                    continue;
                }
                let Some(dep_dir) = self.bundled.module_dir(dep_module) else {
                    warnings.push(format!(
                        "Dependency module '{}' not found in bundled source",
                        dep_module
                    ));
                    continue;
                };
                let opts = InstallOptions {
                    folder_name: &config.folder_name,
                    answers: None,
                    features: &features,
                    skip_post_install: true,
                };
                installer::install_partial(
                    dep_module,
                    &dep_dir,
                    &root,
                    &bucket.paths(),
                    &opts,
                    &mut collect,
                )?;
                partial_modules.push(dep_module.clone());
            }
        }

        // Bring kept sourceless modules back from the backup; their tracked
        // entries carry forward unchanged
        for entry in &previous_entries {
            if is_under_any(&entry.relative_path, &kept_custom) {
                if self.staging.contains(&entry.relative_path) {
                    self.staging
                        .restore(&entry.relative_path, &root.join(&entry.relative_path))?;
                }
                entries.push(entry.clone());
            }
        }

        // Compile agents (overlays first restored from backup so user
        // customizations shape this pass's output)
        let mut pack = PackManifest::new(INSTALLER_VERSION);
        pack.overlay_hashes = overlay_hashes;
        self.restore_staged_overlays(&root)?;
        let artifacts = self.compile_agents(&root, &modules, config, &features, &mut pack)?;

        // RegeneratingManifests
        announce(Phase::RegeneratingManifests);
        for module_id in &modules {
            let mut record = if source.is_custom(module_id) {
                ModuleRecord {
                    source: ModuleSource::Custom,
                    ..ModuleRecord::bundled(module_id.clone())
                }
            } else {
                ModuleRecord::bundled(module_id.clone())
            };
            record.name = Some(module_id.clone());
            pack.modules.push(record);
        }
        for id in &kept_custom {
            let mut record = ModuleRecord {
                source: ModuleSource::Custom,
                ..ModuleRecord::bundled(id.clone())
            };
            record.name = Some(id.clone());
            pack.modules.push(record);
        }
        for dep_module in &partial_modules {
            let mut record = ModuleRecord::bundled(dep_module.clone());
            record.partial = true;
            pack.modules.push(record);
        }
        pack.ides = ide_ids.clone();
        pack.custom_modules = custom_records;
        let stats = store.write_manifests(&mut pack, &entries)?;

        // ConfiguringIdes
        announce(Phase::ConfiguringIdes);
        let ides = self.configure_ides(config, &ide_ids, store, &artifacts, &mut warnings)?;

        // RunningModuleHooks
        announce(Phase::RunningModuleHooks);
        let mut hook_entries = Vec::new();
        {
            let mut collect = collector(&mut hook_entries);
            for module_id in &modules {
                let Some(module_dir) = source.module_dir(module_id) else {
                    continue;
                };
                let messages =
                    installer::run_post_install(module_id, &module_dir, &root, &mut collect)?;
                for message in messages {
                    println!("   💬 {}", message);
                }
            }
        }
        if !hook_entries.is_empty() {
            entries.extend(hook_entries);
            store.write_manifests(&mut pack, &entries)?;
        }

        // RestoringUserFiles
        announce(Phase::RestoringUserFiles);
        let mut outcome = InstallOutcome {
            success: true,
            path: root.clone(),
            modules,
            ides,
            warnings,
            ..Default::default()
        };
        self.restore_user_files(&root, &found, &mut outcome)?;

        // Summarizing
        println!();
        println!("{}", "✅ Installation complete!".green().bold());
        println!(
            "   {} agents, {} workflows, {} tasks, {} tools, {} other files",
            stats.agents, stats.workflows, stats.tasks, stats.tools, stats.files
        );
        if !outcome.custom_files.is_empty() {
            println!(
                "   {} user file(s) preserved untouched",
                outcome.custom_files.len()
            );
        }
        for path in &outcome.modified_files {
            println!(
                "{}",
                format!(
                    "   ⚠ Your edited copy of {} was kept as {}.bak",
                    path.display(),
                    path.display()
                )
                .yellow()
            );
        }
        for warning in &outcome.warnings {
            println!("{}", format!("   ⚠ {}", warning).yellow());
        }

        Ok(outcome)
    }

    /// Quick update / compile-only: recompile agents and refresh manifests
    /// and IDE artifacts, leaving module content in place.
    fn run_refresh(
        &mut self,
        config: &InstallConfig,
        store: &ManifestStore,
    ) -> Result<InstallOutcome> {
        let root = config.install_root();
        let modules = config.effective_modules();
        let entries = store.read_files_manifest();

        let mut pack = store
            .read_pack_manifest()
            .unwrap_or_else(|| PackManifest::new(INSTALLER_VERSION));
        pack.version = INSTALLER_VERSION.to_string();

        let features = load_features(&self.bundled, &config.features);
        let artifacts = self.compile_agents(&root, &modules, config, &features, &mut pack)?;

        announce(Phase::RegeneratingManifests);
        let stats = store.write_manifests(&mut pack, &entries)?;

        announce(Phase::ConfiguringIdes);
        let mut warnings = Vec::new();
        let ides = self.configure_ides(config, &config.ides, store, &artifacts, &mut warnings)?;

        println!();
        println!("{}", "✅ Recompiled.".green().bold());
        println!("   {} tracked files, {} agents", stats.total(), artifacts.len());

        Ok(InstallOutcome {
            success: true,
            path: root,
            modules,
            ides,
            warnings,
            ..Default::default()
        })
    }

    /// Resolve one custom module's source for this pass, prompting the user
    /// when the recorded source has gone away.
    fn resolve_custom(
        &mut self,
        record: &mut CustomModuleRecord,
        store: &ManifestStore,
        root: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<CustomDisposition> {
        match resolve_custom_source(record) {
            CustomSourceState::Live(dir) => {
                let cached = refresh_custom_cache(store, &record.id, &dir)?;
                record.cached_copy_path = Some(cached);
                record.orphaned = false;
                Ok(CustomDisposition::Install(dir))
            }
            CustomSourceState::CachedOnly(cached) => {
                match self
                    .prompter
                    .resolve_orphan(&record.id, &record.source_path.to_string_lossy())?
                {
                    OrphanResolution::KeepWithoutSource => {
                        warnings.push(format!(
                            "Custom module '{}' updated from cached copy; its source {} is unreachable",
                            record.id,
                            record.source_path.display()
                        ));
                        record.orphaned = true;
                        Ok(CustomDisposition::Install(cached))
                    }
                    OrphanResolution::NewSource(dir) => {
                        if !dir.is_dir() {
                            anyhow::bail!(
                                "New source for '{}' is not a directory: {}",
                                record.id,
                                dir.display()
                            );
                        }
                        record.source_path = dir.clone();
                        record.orphaned = false;
                        let cached = refresh_custom_cache(store, &record.id, &dir)?;
                        record.cached_copy_path = Some(cached);
                        Ok(CustomDisposition::Install(dir))
                    }
                    OrphanResolution::Remove => {
                        self.remove_custom_files(record, store, root)?;
                        Ok(CustomDisposition::Remove)
                    }
                }
            }
            CustomSourceState::Missing => {
                match self
                    .prompter
                    .resolve_orphan(&record.id, &record.source_path.to_string_lossy())?
                {
                    OrphanResolution::NewSource(dir) if dir.is_dir() => {
                        record.source_path = dir.clone();
                        record.orphaned = false;
                        let cached = refresh_custom_cache(store, &record.id, &dir)?;
                        record.cached_copy_path = Some(cached);
                        Ok(CustomDisposition::Install(dir))
                    }
                    OrphanResolution::NewSource(dir) => {
                        anyhow::bail!(
                            "New source for '{}' is not a directory: {}",
                            record.id,
                            dir.display()
                        )
                    }
                    OrphanResolution::Remove => {
                        self.remove_custom_files(record, store, root)?;
                        Ok(CustomDisposition::Remove)
                    }
                    OrphanResolution::KeepWithoutSource => {
                        // Installed files stay as they are; nothing to
                        // install from this pass
                        warnings.push(format!(
                            "Custom module '{}' kept as-is; no source or cache available",
                            record.id
                        ));
                        record.orphaned = true;
                        Ok(CustomDisposition::Keep)
                    }
                }
            }
        }
    }

    fn remove_custom_files(
        &self,
        record: &CustomModuleRecord,
        store: &ManifestStore,
        root: &Path,
    ) -> Result<()> {
        let module_dir = root.join(&record.id);
        if module_dir.exists() {
            std::fs::remove_dir_all(&module_dir)
                .with_context(|| format!("Failed to remove {}", module_dir.display()))?;
        }
        let cache_dir = store.custom_cache_dir(&record.id);
        if cache_dir.exists() {
            std::fs::remove_dir_all(&cache_dir)?;
        }
        println!(
            "{}",
            format!("🗑  Removed custom module '{}'", record.id).yellow()
        );
        Ok(())
    }

    /// Overlays staged during backup are restored before compilation so the
    /// user's customizations shape this pass's compiled agents.
    fn restore_staged_overlays(&mut self, root: &Path) -> Result<()> {
        let prefix = format!("{}/{}/", CFG_DIR, AGENTS_CFG_DIR);
        for rel in self.staging.stashed_paths() {
            if rel.starts_with(&prefix) {
                self.staging.restore(&rel, &root.join(&rel))?;
            }
        }
        Ok(())
    }

    /// Compile every installed `.agent.yaml` into its renderable artifact,
    /// generating a default overlay (and recording its pristine hash) for
    /// agents that do not have one yet.
    fn compile_agents(
        &mut self,
        root: &Path,
        modules: &[String],
        config: &InstallConfig,
        features: &FeatureSet,
        pack: &mut PackManifest,
    ) -> Result<Vec<AgentArtifact>> {
        println!("{}", "🤖 Compiling agents...".cyan());
        let store = ManifestStore::new(root);
        let mut artifacts = Vec::new();

        for module_id in modules {
            let agents_dir = root.join(module_id).join("agents");
            let Ok(dir_entries) = std::fs::read_dir(&agents_dir) else {
                continue;
            };
            let mut sources: Vec<PathBuf> = dir_entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.ends_with(".agent.yaml"))
                        .unwrap_or(false)
                })
                .collect();
            sources.sort();

            for source_path in sources {
                let definition = match compiler::load_definition(&source_path) {
                    Ok(def) => def,
                    Err(e) => {
                        eprintln!(
                            "{}",
                            format!("⚠ Skipping agent {}: {}", source_path.display(), e).yellow()
                        );
                        continue;
                    }
                };
                let agent_id = definition.metadata.id.clone();

                let overlay_path = store.overlay_path(&agent_id);
                let overlay = if overlay_path.exists() {
                    let content = std::fs::read_to_string(&overlay_path)?;
                    match CustomizeOverlay::parse(&content) {
                        Ok(overlay) => Some(overlay),
                        Err(e) => {
                            eprintln!(
                                "{}",
                                format!(
                                    "⚠ Ignoring unparseable overlay {}: {}",
                                    overlay_path.display(),
                                    e
                                )
                                .yellow()
                            );
                            None
                        }
                    }
                } else {
                    let default = CustomizeOverlay::default_yaml();
                    if let Some(parent) = overlay_path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&overlay_path, &default)?;
                    pack.overlay_hashes
                        .insert(agent_id.clone(), hashing::hash_bytes(default.as_bytes()));
                    None
                };

                let compiled = compiler::compile(
                    &definition,
                    overlay.as_ref(),
                    &agent_id,
                    &config.folder_name,
                    features,
                );
                let artifact_path = agents_dir.join(&compiled.file_name);
                std::fs::write(&artifact_path, &compiled.content)
                    .with_context(|| format!("Failed to write {}", artifact_path.display()))?;

                if compiled.sidecar {
                    std::fs::create_dir_all(root.join(format!("{}-sidecar", agent_id)))?;
                }

                artifacts.push(AgentArtifact {
                    module: module_id.clone(),
                    id: agent_id,
                    title: compiled.metadata.title.clone(),
                    relative_path: format!("{}/agents/{}", module_id, compiled.file_name),
                });
            }
        }

        println!("   ✓ {} agent(s) compiled", artifacts.len());
        Ok(artifacts)
    }

    fn configure_ides(
        &mut self,
        config: &InstallConfig,
        ide_ids: &[String],
        store: &ManifestStore,
        artifacts: &[AgentArtifact],
        warnings: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let mut configured = Vec::new();
        for ide_id in ide_ids {
            let Some(adapter) = ide::adapter_for(ide_id) else {
                warnings.push(format!(
                    "Unknown IDE '{}' (supported: {})",
                    ide_id,
                    ide::supported_ides().join(", ")
                ));
                continue;
            };
            let ide_config = store.load_ide_config(ide_id).unwrap_or_default();
            let ctx = IdeSetupContext {
                project_dir: &config.target_dir,
                install_root: store.root(),
                folder_name: &config.folder_name,
                selected_modules: &config.modules,
                agents: artifacts,
                config: &ide_config,
            };
            match adapter.setup(&ctx) {
                Ok(report) => {
                    if let Some(updated) = report.config {
                        store.save_ide_config(ide_id, &updated)?;
                    }
                    println!(
                        "   ✓ {} ({} command file(s))",
                        adapter.display_name(),
                        report.count
                    );
                    configured.push(ide_id.clone());
                }
                Err(e) => {
                    warnings.push(format!("IDE setup failed for '{}': {}", ide_id, e));
                }
            }
        }
        Ok(configured)
    }

    /// Custom files come back at their original paths, clobbering whatever
    /// this pass wrote there. Modified tracked files come back as `.bak`
    /// siblings; the fresh content wins at the real path.
    fn restore_user_files(
        &mut self,
        root: &Path,
        found: &Reconciliation,
        outcome: &mut InstallOutcome,
    ) -> Result<()> {
        for path in &found.custom_files {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if self.staging.contains(&rel) {
                self.staging.restore(&rel, path)?;
                outcome.custom_files.push(path.clone());
            }
        }
        for modified in &found.modified_files {
            if self.staging.contains(&modified.relative_path) {
                let bak = PathBuf::from(format!("{}.bak", modified.path.display()));
                self.staging.restore(&modified.relative_path, &bak)?;
                outcome.modified_files.push(modified.path.clone());
            }
        }
        Ok(())
    }
}

/// Fill module and IDE selections the config leaves empty from what the
/// manifest recorded on the previous pass. Dependency-only partials never
/// count as selected modules.
fn merge_previous_selection(config: &mut InstallConfig, pack: &PackManifest) {
    if config.modules.is_empty() {
        config.modules = pack
            .modules
            .iter()
            .filter(|m| !m.partial)
            .map(|m| m.id.clone())
            .collect();
    }
    if config.ides.is_empty() {
        config.ides = pack.ides.clone();
    }
}

fn is_under_any(relative_path: &str, module_ids: &[String]) -> bool {
    module_ids
        .iter()
        .any(|id| relative_path.starts_with(&format!("{}/", id)))
}

fn versions_match(a: &str, b: &str) -> bool {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Hash every written file into a manifest entry; an unreadable file is
/// logged and left untracked (it installed, it just cannot participate in
/// modification detection).
fn collector(entries: &mut Vec<ManifestEntry>) -> impl FnMut(WrittenFile) + '_ {
    move |written: WrittenFile| match hashing::hash_file(&written.path) {
        Ok(hash) => {
            entries.push(ManifestEntry::new(
                written.kind,
                &written.name,
                &written.module,
                &written.relative_path,
                &hash,
            ));
        }
        Err(e) => {
            eprintln!(
                "{}",
                format!(
                    "⚠ Installed but untracked (hash failed): {}: {}",
                    written.relative_path, e
                )
                .yellow()
            );
        }
    }
}

/// Enabled feature flags resolve their injected content from the bundled
/// core module's feature snippets.
fn load_features(bundled: &BundledSource, flags: &BTreeMap<String, bool>) -> FeatureSet {
    let mut features = FeatureSet::new();
    for (name, enabled) in flags {
        if !enabled {
            continue;
        }
        let snippet = bundled
            .root()
            .join("core/_module-installer/features")
            .join(format!("{}.md", name));
        match std::fs::read_to_string(&snippet) {
            Ok(content) => features.enable(name, content.trim_end()),
            Err(_) => {
                eprintln!(
                    "{}",
                    format!("⚠ No content for feature '{}'; marker will be stripped", name)
                        .yellow()
                );
                features.enable(name, "");
            }
        }
    }
    features
}

fn write_module_config(root: &Path, module_id: &str, config: &InstallConfig) -> Result<()> {
    let empty = BTreeMap::new();
    let answers = config.answers.get(module_id).unwrap_or(&empty);
    let module_config = ModuleConfig {
        module: module_id,
        folder: &config.folder_name,
        generated: true,
        answers,
    };
    let yaml = serde_yaml::to_string(&module_config)
        .with_context(|| format!("Failed to serialize config for '{}'", module_id))?;
    let path = root.join(module_id).join(MODULE_CONFIG_FILE);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, yaml)?;
    Ok(())
}
