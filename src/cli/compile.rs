use crate::config::InstallConfig;
use crate::orchestrator::InstallOrchestrator;
use crate::source::BundledSource;
use crate::Result;
use colored::Colorize;
use std::env;
use std::path::PathBuf;

pub async fn run(dir: Option<&str>, folder: &str) -> Result<()> {
    let target_dir = match dir {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };

    println!("{}", "🤖 Recompiling agents...".cyan().bold());
    println!();

    let mut config = InstallConfig::new(target_dir);
    config.folder_name = folder.to_string();

    let bundled = BundledSource::discover()?;
    let mut orchestrator = InstallOrchestrator::with_defaults(bundled)?;
    orchestrator.compile(&config)?;
    Ok(())
}
