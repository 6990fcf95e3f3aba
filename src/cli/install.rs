use crate::config::InstallConfig;
use crate::orchestrator::InstallOrchestrator;
use crate::source::BundledSource;
use crate::Result;
use colored::Colorize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    dir: Option<&str>,
    folder: &str,
    modules: &[String],
    ides: &[String],
    features: &[String],
    answers: &[String],
    force: bool,
) -> Result<()> {
    let target_dir = match dir {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };

    println!(
        "{}",
        format!("🚀 Installing agent pack into {}...", target_dir.display())
            .cyan()
            .bold()
    );
    println!();

    let mut config = InstallConfig::new(target_dir);
    config.folder_name = folder.to_string();
    config.modules = modules.to_vec();
    config.ides = ides.to_vec();
    config.force_reinstall = force;
    for feature in features {
        config.features.insert(feature.clone(), true);
    }
    config.answers = parse_answers(answers)?;

    let bundled = BundledSource::discover()?;
    let mut orchestrator = InstallOrchestrator::with_defaults(bundled)?;
    let outcome = orchestrator.install(&config)?;

    if outcome.success {
        println!();
        println!("   Installed at {}", outcome.path.display());
    }
    Ok(())
}

/// `--answer module.key=value` flags, grouped per module
fn parse_answers(raw: &[String]) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let mut answers: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for item in raw {
        let Some((target, value)) = item.split_once('=') else {
            anyhow::bail!("Invalid answer '{}'; expected module.key=value", item);
        };
        let Some((module, key)) = target.split_once('.') else {
            anyhow::bail!("Invalid answer '{}'; expected module.key=value", item);
        };
        answers
            .entry(module.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }
    Ok(answers)
}
