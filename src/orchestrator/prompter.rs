//! Interactive decisions, behind a trait so flows are testable.

use crate::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::collections::VecDeque;
use std::path::PathBuf;

/// What to do with an existing install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    Update,
    QuickUpdate,
    Reinstall,
    CompileOnly,
    Cancel,
}

/// How to handle a custom module whose live source has disappeared
#[derive(Debug, Clone, PartialEq)]
pub enum OrphanResolution {
    /// Keep installed files, update from the frozen cache copy
    KeepWithoutSource,
    /// Re-point the module at a new source directory
    NewSource(PathBuf),
    /// Remove the module and its installed files
    Remove,
}

pub trait Prompter {
    fn choose_action(&mut self, installed_version: &str, pack_version: &str)
        -> Result<InstallAction>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Destructive confirmation: the user must type `expected` verbatim.
    fn confirm_typed(&mut self, prompt: &str, expected: &str) -> Result<bool>;

    fn resolve_orphan(&mut self, module_id: &str, last_source: &str) -> Result<OrphanResolution>;
}

/// Terminal prompter
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn choose_action(
        &mut self,
        installed_version: &str,
        pack_version: &str,
    ) -> Result<InstallAction> {
        let items = vec![
            format!("Update ({} -> {})", installed_version, pack_version),
            "Quick update (recompile and refresh, same version)".to_string(),
            "Reinstall from scratch".to_string(),
            "Recompile agents only".to_string(),
            "Cancel".to_string(),
        ];
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Existing installation found")
            .items(&items)
            .default(0)
            .interact()?;
        Ok(match choice {
            0 => InstallAction::Update,
            1 => InstallAction::QuickUpdate,
            2 => InstallAction::Reinstall,
            3 => InstallAction::CompileOnly,
            _ => InstallAction::Cancel,
        })
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn confirm_typed(&mut self, prompt: &str, expected: &str) -> Result<bool> {
        let typed: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} (type '{}' to confirm)", prompt, expected))
            .allow_empty(true)
            .interact_text()?;
        Ok(typed.trim() == expected)
    }

    fn resolve_orphan(&mut self, module_id: &str, last_source: &str) -> Result<OrphanResolution> {
        let items = vec![
            "Keep the module (update from cached copy)".to_string(),
            "Point at a new source directory".to_string(),
            "Remove the module".to_string(),
        ];
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Custom module '{}' source is unreachable ({})",
                module_id, last_source
            ))
            .items(&items)
            .default(0)
            .interact()?;
        match choice {
            1 => {
                let path: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("New source directory")
                    .interact_text()?;
                Ok(OrphanResolution::NewSource(PathBuf::from(path)))
            }
            2 => {
                if self.confirm_typed(
                    &format!("Remove '{}' and delete its installed files?", module_id),
                    module_id,
                )? {
                    Ok(OrphanResolution::Remove)
                } else {
                    Ok(OrphanResolution::KeepWithoutSource)
                }
            }
            _ => Ok(OrphanResolution::KeepWithoutSource),
        }
    }
}

/// Canned answers for tests and non-interactive runs
pub struct ScriptedPrompter {
    pub action: InstallAction,
    pub confirmations: VecDeque<bool>,
    pub typed: VecDeque<String>,
    pub orphan: VecDeque<OrphanResolution>,
}

impl ScriptedPrompter {
    pub fn new(action: InstallAction) -> Self {
        Self {
            action,
            confirmations: VecDeque::new(),
            typed: VecDeque::new(),
            orphan: VecDeque::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn choose_action(&mut self, _installed: &str, _pack: &str) -> Result<InstallAction> {
        Ok(self.action)
    }

    fn confirm(&mut self, _prompt: &str, default: bool) -> Result<bool> {
        Ok(self.confirmations.pop_front().unwrap_or(default))
    }

    fn confirm_typed(&mut self, _prompt: &str, expected: &str) -> Result<bool> {
        match self.typed.pop_front() {
            Some(typed) => Ok(typed == expected),
            None => Ok(false),
        }
    }

    fn resolve_orphan(&mut self, _module_id: &str, _last: &str) -> Result<OrphanResolution> {
        Ok(self
            .orphan
            .pop_front()
            .unwrap_or(OrphanResolution::KeepWithoutSource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_typed_confirmation_matches_exactly() {
        let mut prompter = ScriptedPrompter::new(InstallAction::Update);
        prompter.typed.push_back("my-mod".to_string());
        prompter.typed.push_back("wrong".to_string());

        assert!(prompter.confirm_typed("remove?", "my-mod").unwrap());
        assert!(!prompter.confirm_typed("remove?", "my-mod").unwrap());
        // Exhausted queue refuses rather than confirming
        assert!(!prompter.confirm_typed("remove?", "my-mod").unwrap());
    }

    #[test]
    fn test_scripted_defaults() {
        let mut prompter = ScriptedPrompter::new(InstallAction::Cancel);
        assert_eq!(
            prompter.choose_action("1.0.0", "1.1.0").unwrap(),
            InstallAction::Cancel
        );
        assert!(prompter.confirm("go?", true).unwrap());
        assert_eq!(
            prompter.resolve_orphan("m", "/gone").unwrap(),
            OrphanResolution::KeepWithoutSource
        );
    }
}
