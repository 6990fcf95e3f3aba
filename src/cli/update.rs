use crate::config::InstallConfig;
use crate::orchestrator::InstallOrchestrator;
use crate::source::BundledSource;
use crate::Result;
use colored::Colorize;
use std::env;
use std::path::PathBuf;

pub async fn run(dir: Option<&str>, folder: &str, quick: bool) -> Result<()> {
    let target_dir = match dir {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };

    println!(
        "{}",
        format!("🔄 Updating agent pack in {}...", target_dir.join(folder).display())
            .cyan()
            .bold()
    );
    println!();

    let mut config = InstallConfig::new(target_dir);
    config.folder_name = folder.to_string();
    config.quick_update = quick;

    let bundled = BundledSource::discover()?;
    let mut orchestrator = InstallOrchestrator::with_defaults(bundled)?;
    orchestrator.update(&config)?;
    Ok(())
}
