use crate::orchestrator::InstallOrchestrator;
use crate::source::BundledSource;
use crate::Result;
use std::env;
use std::path::PathBuf;

pub async fn run(dir: Option<&str>, folder: &str) -> Result<()> {
    let target_dir = match dir {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };

    // Uninstall never reads module sources; an empty bundled root is fine
    // when the pack is not discoverable.
    let bundled = BundledSource::discover().unwrap_or_else(|_| BundledSource::new(&target_dir));
    let mut orchestrator = InstallOrchestrator::with_defaults(bundled)?;
    orchestrator.uninstall(&target_dir, folder)?;
    Ok(())
}
